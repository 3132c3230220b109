//! Common types for LLM provider integration.
//!
//! The pipeline only ever sends text prompts and reads text completions, so
//! these types cover plain chat completions across all providers.

use serde::{Deserialize, Serialize};

/// A chat message in a completion request or response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role: "user" for every prompt the pipeline sends.
    pub role: String,
    /// Text content of the message.
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// Request for a chat completion.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier (e.g. "claude-sonnet-4-20250514", "gpt-4o").
    /// Empty means the provider's default model.
    pub model: String,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0–2.0).
    pub temperature: f32,
}

impl Default for ChatRequest {
    fn default() -> Self {
        Self {
            model: String::new(),
            messages: Vec::new(),
            max_tokens: 2048,
            temperature: 0.0,
        }
    }
}

/// Response from a chat completion.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The assistant's response text (empty when the model returned none).
    pub content: String,
    /// Finish reason: "stop", "length", etc.
    pub finish_reason: String,
    /// Token usage statistics.
    pub usage: TokenUsage,
    /// Raw model identifier used.
    pub model: String,
}

/// Token usage statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}
