//! Anthropic Claude API provider.
//!
//! Implements the [`LlmProvider`] trait for the Anthropic Messages API
//! (`/v1/messages`), text completions only.

use std::sync::OnceLock;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use zeroize::Zeroizing;

use crate::BoxFuture;

use super::provider::{LlmError, LlmProvider};
use super::types::*;

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_API_VERSION: &str = "2023-06-01";

/// Anthropic Claude provider.
pub struct AnthropicProvider {
    client: Client,
    blocking: OnceLock<reqwest::blocking::Client>,
    api_key: Zeroizing<String>,
    default_model: String,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            blocking: OnceLock::new(),
            api_key: Zeroizing::new(api_key.into()),
            default_model: "claude-sonnet-4-20250514".to_string(),
        }
    }

    /// Set the default model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Convert our ChatRequest into Anthropic's API format.
    fn build_request_body(&self, request: &ChatRequest) -> AnthropicRequest {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let messages: Vec<AnthropicMessage> = request
            .messages
            .iter()
            .map(|m| AnthropicMessage {
                role: m.role.clone(),
                content: m.content.clone(),
            })
            .collect();

        AnthropicRequest {
            model,
            max_tokens: request.max_tokens,
            messages,
            temperature: Some(request.temperature),
        }
    }

    /// Parse Anthropic's response into our ChatResponse.
    fn parse_response(&self, resp: AnthropicResponse) -> ChatResponse {
        let content = resp
            .content
            .into_iter()
            .filter_map(|block| match block {
                AnthropicBlock::Text { text } => Some(text),
                AnthropicBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let finish_reason = match resp.stop_reason.as_deref() {
            Some("end_turn") | Some("stop_sequence") => "stop".to_string(),
            Some("max_tokens") => "length".to_string(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        };

        ChatResponse {
            content,
            finish_reason,
            usage: TokenUsage {
                prompt_tokens: resp.usage.input_tokens,
                completion_tokens: resp.usage.output_tokens,
                total_tokens: resp.usage.input_tokens + resp.usage.output_tokens,
            },
            model: resp.model,
        }
    }

    fn blocking_client(&self) -> &reqwest::blocking::Client {
        self.blocking.get_or_init(reqwest::blocking::Client::new)
    }
}

impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        "Anthropic"
    }

    fn chat(&self, request: &ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LlmError>> {
        let body = self.build_request_body(request);
        Box::pin(async move {
            debug!(model = %body.model, "Anthropic chat request");

            let resp = self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", self.api_key.as_str())
                .header("anthropic-version", ANTHROPIC_API_VERSION)
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

            let api_resp: AnthropicResponse = resp
                .json()
                .await
                .map_err(|e| LlmError::Parse(e.to_string()))?;

            Ok(self.parse_response(api_resp))
        })
    }

    fn chat_blocking(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError> {
        let body = self.build_request_body(request);
        debug!(model = %body.model, "Anthropic chat request (blocking)");

        let resp = self
            .blocking_client()
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", self.api_key.as_str())
            .header("anthropic-version", ANTHROPIC_API_VERSION)
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

        let api_resp: AnthropicResponse =
            resp.json().map_err(|e| LlmError::Parse(e.to_string()))?;
        Ok(self.parse_response(api_resp))
    }
}

// ── Anthropic API types (private) ───────────────────────────────────────

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<AnthropicMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum AnthropicBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    model: String,
    content: Vec<AnthropicBlock>,
    stop_reason: Option<String>,
    usage: AnthropicUsage,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}
