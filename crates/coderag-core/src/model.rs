//! The language model capability consumed by the pipeline.
//!
//! [`LanguageModel`] is prompt-in/text-out with a blocking and a suspendable
//! form, plus a token counter used for context budgeting. [`ProviderModel`]
//! implements it on top of any chat-completions [`LlmProvider`].

use std::sync::Arc;

use crate::BoxFuture;
use crate::llm::{ChatMessage, ChatRequest, LlmError, LlmProvider};

/// A text generation service.
///
/// Implementations are shared across invocations and must be safe for
/// concurrent use; the pipeline performs no locking of its own.
pub trait LanguageModel: Send + Sync {
    /// Display name used in logs (e.g. `"OpenAI:gpt-4o"`).
    fn name(&self) -> &str;

    /// Generate a completion, blocking the calling thread.
    fn generate(&self, prompt: &str) -> Result<String, LlmError>;

    /// Generate a completion on the async runtime.
    fn generate_async<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>>;

    /// Token cost of `text` for this model.
    fn count_tokens(&self, text: &str) -> usize {
        estimate_tokens(text)
    }
}

/// Estimate the token count for a string (~4 chars per token).
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4)
}

/// A [`LanguageModel`] backed by a chat-completions provider.
///
/// Every prompt is sent as a single user message.
pub struct ProviderModel {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    temperature: f32,
    label: String,
}

impl ProviderModel {
    /// Wrap `provider`, using its default model.
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        let label = provider.name().to_string();
        Self {
            provider,
            model: String::new(),
            max_tokens: 2048,
            temperature: 0.0,
            label,
        }
    }

    /// Build from the `[llm]` config section. `model_override` selects a
    /// stage-specific model (condense or critic) on the same provider.
    pub fn from_config(
        provider: Arc<dyn LlmProvider>,
        config: &coderag_config::LlmConfig,
        model_override: Option<&str>,
    ) -> Self {
        Self::new(provider)
            .with_model(model_override.unwrap_or(&config.model))
            .with_max_tokens(config.max_tokens)
            .with_temperature(config.temperature)
    }

    /// Request a specific model. Empty keeps the provider default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self.label = if self.model.is_empty() {
            self.provider.name().to_string()
        } else {
            format!("{}:{}", self.provider.name(), self.model)
        };
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    fn request(&self, prompt: &str) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::user(prompt)],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        }
    }
}

impl LanguageModel for ProviderModel {
    fn name(&self) -> &str {
        &self.label
    }

    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let response = self.provider.chat_blocking(&self.request(prompt))?;
        Ok(response.content)
    }

    fn generate_async<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
        let request = self.request(prompt);
        Box::pin(async move {
            let response = self.provider.chat(&request).await?;
            Ok(response.content)
        })
    }
}
