//! OpenAI-compatible API provider.
//!
//! Implements the [`LlmProvider`] trait for OpenAI's Chat Completions API.
//! Also compatible with any provider that follows the OpenAI API format
//! (e.g. Ollama, vLLM, Together AI).

use std::sync::OnceLock;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::BoxFuture;

use super::provider::{LlmError, LlmProvider};
use super::types::*;

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

/// OpenAI-compatible provider.
pub struct OpenAiProvider {
    client: Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    api_key: Zeroizing<String>,
    base_url: String,
    default_model: String,
}

impl OpenAiProvider {
    /// Create a new OpenAI provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            blocking: OnceLock::new(),
            api_key: Zeroizing::new(api_key.into()),
            base_url: OPENAI_API_URL.to_string(),
            default_model: "gpt-4o".to_string(),
        }
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set a custom base URL (for OpenAI-compatible providers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Convert our ChatRequest into OpenAI's API format.
    fn build_request_body(&self, request: &ChatRequest) -> OpenAiRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let messages: Vec<OpenAiMessage> = request
            .messages
            .iter()
            .map(|msg| OpenAiMessage {
                role: msg.role.clone(),
                content: Some(msg.content.clone()),
            })
            .collect();

        OpenAiRequest {
            model,
            messages,
            max_tokens: Some(request.max_tokens),
            temperature: Some(request.temperature),
        }
    }

    /// Parse OpenAI's response into our ChatResponse.
    fn parse_response(&self, resp: OpenAiResponse) -> Result<ChatResponse, LlmError> {
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Parse("no choices in response".to_string()))?;

        let finish_reason = choice
            .finish_reason
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ChatResponse {
            content: choice.message.content.unwrap_or_default(),
            finish_reason,
            usage: resp.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            }),
            model: resp.model,
        })
    }

    fn blocking_client(&self) -> &reqwest::blocking::Client {
        self.blocking.get_or_init(reqwest::blocking::Client::new)
    }
}

impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &str {
        "OpenAI"
    }

    fn chat(&self, request: &ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LlmError>> {
        let body = self.build_request_body(request);
        Box::pin(async move {
            debug!(model = %body.model, "OpenAI chat request");

            let resp = self
                .client
                .post(&self.base_url)
                .header("authorization", format!("Bearer {}", self.api_key.as_str()))
                .json(&body)
                .send()
                .await
                .map_err(LlmError::from_transport)?;

            let status = resp.status();
            if !status.is_success() {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                let error_body = resp.text().await.unwrap_or_default();
                return Err(LlmError::from_status(
                    status.as_u16(),
                    retry_after.as_deref(),
                    error_body,
                ));
            }

            let api_resp: OpenAiResponse = resp
                .json()
                .await
                .map_err(|e| LlmError::Parse(e.to_string()))?;

            self.parse_response(api_resp)
        })
    }

    fn chat_blocking(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self.build_request_body(request);
        debug!(model = %body.model, "OpenAI chat request (blocking)");

        let resp = self
            .blocking_client()
            .post(&self.base_url)
            .header("authorization", format!("Bearer {}", self.api_key.as_str()))
            .json(&body)
            .send()
            .map_err(LlmError::from_transport)?;

        let status = resp.status();
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let error_body = resp.text().unwrap_or_default();
            return Err(LlmError::from_status(
                status.as_u16(),
                retry_after.as_deref(),
                error_body,
            ));
        }

        let api_resp: OpenAiResponse = resp.json().map_err(|e| LlmError::Parse(e.to_string()))?;
        self.parse_response(api_resp)
    }
}

// ── OpenAI API types (private) ──────────────────────────────────────────

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}
