//! LLM provider integration for multi-provider chat completions.
//!
//! coderag talks to language models through a unified [`LlmProvider`] trait.
//! Currently supported:
//!
//! - **Anthropic**: Claude models via the Messages API
//! - **OpenAI**: GPT models via the Chat Completions API (also compatible with
//!   Ollama, vLLM, Together AI, and other OpenAI-compatible endpoints)
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────┐     ┌──────────────┐
//! │ CodePipeline │────▶│ LanguageModel │────▶│ LlmProvider  │  (trait)
//! └──────────────┘     │ (ProviderModel)│    └──────┬───────┘
//!                      └───────────────┘            │
//!                                        ┌──────────┴──────────┐
//!                                        ▼                     ▼
//!                               ┌──────────────┐      ┌──────────────┐
//!                               │  Anthropic   │      │    OpenAI    │
//!                               └──────────────┘      └──────────────┘
//! ```

pub mod anthropic;
pub mod openai;
pub mod provider;
pub mod types;

use std::sync::Arc;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::{LlmError, LlmProvider};
pub use types::*;

/// Create an LLM provider from config.
///
/// Reads the `[llm]` section of the config to determine which provider
/// to use and how to authenticate.
pub fn create_provider(config: &coderag_config::LlmConfig) -> Arc<dyn LlmProvider> {
    use coderag_config::LlmProviderKind;

    let api_key = config.resolve_api_key();
    match config.provider {
        LlmProviderKind::Anthropic => {
            let mut provider = AnthropicProvider::new(api_key);
            if !config.model.is_empty() {
                provider = provider.with_model(&config.model);
            }
            Arc::new(provider)
        }
        LlmProviderKind::OpenAi => {
            let mut provider = OpenAiProvider::new(api_key);
            if !config.model.is_empty() {
                provider = provider.with_model(&config.model);
            }
            if let Some(ref base_url) = config.base_url {
                provider = provider.with_base_url(base_url);
            }
            Arc::new(provider)
        }
    }
}
