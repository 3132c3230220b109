//! The LLM provider trait: the core abstraction for chat completions.
//!
//! All LLM backends (Anthropic, OpenAI-compatible) implement this trait.
//! [`ProviderModel`](crate::model::ProviderModel) adapts a provider to the
//! prompt-in/text-out interface the pipeline consumes.

use crate::BoxFuture;

use super::types::{ChatRequest, ChatResponse};

/// Errors from LLM provider calls.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("API request failed: {0}")]
    Request(String),

    #[error("authentication failed (check API key): {0}")]
    Auth(String),

    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("model not found: {0}")]
    ModelNotFound(String),

    #[error("response parse error: {0}")]
    Parse(String),

    #[error("provider error: {status}: {message}")]
    ProviderError { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,
}

impl LlmError {
    /// Map a non-success HTTP status to an error.
    ///
    /// `retry_after` is the raw `retry-after` header value, if any.
    pub(crate) fn from_status(status: u16, retry_after: Option<&str>, body: String) -> Self {
        match status {
            401 | 403 => LlmError::Auth("invalid API key".to_string()),
            404 => LlmError::ModelNotFound(body),
            429 => LlmError::RateLimited {
                retry_after_secs: retry_after.and_then(|v| v.trim().parse().ok()).unwrap_or(60),
            },
            _ => LlmError::ProviderError {
                status,
                message: body,
            },
        }
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout
        } else if err.is_builder() {
            LlmError::Request(err.to_string())
        } else {
            LlmError::Network(err.to_string())
        }
    }
}

/// Core trait for LLM providers.
///
/// Implementations must be `Send + Sync` so one provider can be shared by
/// concurrent pipeline invocations. Uses `BoxFuture` for object safety
/// (allows `Arc<dyn LlmProvider>`).
pub trait LlmProvider: Send + Sync {
    /// Provider display name (e.g. "Anthropic", "OpenAI").
    fn name(&self) -> &str;

    /// Perform a chat completion on the async runtime.
    fn chat(&self, request: &ChatRequest) -> BoxFuture<'_, Result<ChatResponse, LlmError>>;

    /// Perform a chat completion, blocking the calling thread.
    ///
    /// Must not be called from inside an async task; use
    /// `tokio::task::spawn_blocking` there.
    fn chat_blocking(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;
}
