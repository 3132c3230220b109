#![deny(unsafe_code)]

//! Configuration loading and validation for coderag.
//!
//! Loads TOML configuration files and validates them before any service is
//! constructed. [`AppConfig`] is the central configuration structure; every
//! section has defaults so an empty file (or no file) is a valid config.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Errors that can occur during configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language model provider configuration.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Pipeline behaviour and output shaping.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Prompt template overrides.
    #[serde(default)]
    pub prompts: PromptsConfig,

    /// Knowledge store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which chat-completions backend to talk to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    /// OpenAI Chat Completions, or any endpoint speaking the same format.
    #[default]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

/// Language model configuration.
///
/// ## TOML Example
///
/// ```toml
/// [llm]
/// provider = "openai"
/// api_key_env = "OPENAI_API_KEY"
/// model = "gpt-4o"
/// critic_model = "gpt-4o-mini"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider backend.
    #[serde(default)]
    pub provider: LlmProviderKind,

    /// Inline API key. Prefer `api_key_env` outside of local testing.
    #[serde(default)]
    pub api_key: String,

    /// Environment variable consulted when `api_key` is empty.
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Model used for answer synthesis (and every other stage unless overridden).
    /// Empty means the provider's default model.
    #[serde(default)]
    pub model: String,

    /// Custom endpoint URL (OpenAI-compatible servers such as Ollama or vLLM).
    #[serde(default)]
    pub base_url: Option<String>,

    /// Model used to condense the conversation into a retrieval query.
    #[serde(default)]
    pub condense_model: Option<String>,

    /// Model used for the safety critique of generated code.
    #[serde(default)]
    pub critic_model: Option<String>,

    /// Maximum tokens the model may generate per call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature (0.0–2.0).
    #[serde(default)]
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            api_key: String::new(),
            api_key_env: None,
            model: String::new(),
            base_url: None,
            condense_model: None,
            critic_model: None,
            max_tokens: default_max_tokens(),
            temperature: 0.0,
        }
    }
}

fn default_max_tokens() -> u32 {
    2048
}

impl LlmConfig {
    /// Resolve the API key: the inline value wins, then `api_key_env`, then
    /// the provider's conventional variable.
    pub fn resolve_api_key(&self) -> String {
        if !self.api_key.is_empty() {
            return self.api_key.clone();
        }
        let var = self
            .api_key_env
            .clone()
            .unwrap_or_else(|| match self.provider {
                LlmProviderKind::OpenAi => "OPENAI_API_KEY".to_string(),
                LlmProviderKind::Anthropic => "ANTHROPIC_API_KEY".to_string(),
            });
        match std::env::var(&var) {
            Ok(key) => key,
            Err(_) => {
                debug!(var = %var, "API key variable not set");
                String::new()
            }
        }
    }
}

/// How chat history is serialized into prompts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryFormat {
    /// `Human: ...` / `Assistant: ...` lines, each preceded by a newline.
    #[default]
    Transcript,
    /// `user: ...` / `assistant: ...` lines joined by newlines.
    Plain,
}

/// Pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Token ceiling for retrieved context. Unset disables trimming.
    #[serde(default)]
    pub max_context_tokens: Option<usize>,

    /// Include the (post-trim) retrieved documents in results.
    #[serde(default)]
    pub include_source_documents: bool,

    /// Include the display-safe condensed query in results.
    #[serde(default)]
    pub include_generated_question: bool,

    /// Include the safety verdict in results.
    #[serde(default = "default_true")]
    pub include_safety_verdict: bool,

    /// Substrings removed from the condensed query before it is displayed.
    #[serde(default = "default_leak_terms")]
    pub leak_terms: Vec<String>,

    /// Language tag expected right after the opening code fence.
    #[serde(default = "default_code_language")]
    pub code_language: String,

    /// Separator placed between documents in the context block.
    #[serde(default = "default_document_separator")]
    pub document_separator: String,

    /// Chat history serialization style.
    #[serde(default)]
    pub history_format: HistoryFormat,

    /// Refuse to synthesize when no document survives the budget.
    #[serde(default)]
    pub require_context: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: None,
            include_source_documents: false,
            include_generated_question: false,
            include_safety_verdict: default_true(),
            leak_terms: default_leak_terms(),
            code_language: default_code_language(),
            document_separator: default_document_separator(),
            history_format: HistoryFormat::default(),
            require_context: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_leak_terms() -> Vec<String> {
    vec!["streamlit".to_string(), "python".to_string()]
}

fn default_code_language() -> String {
    "python".to_string()
}

fn default_document_separator() -> String {
    "\n\n".to_string()
}

/// Optional file overrides for the built-in prompt templates.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct PromptsConfig {
    /// Template that condenses history + question into a standalone query.
    #[serde(default)]
    pub condense: Option<String>,

    /// Template that produces the code answer from retrieved context.
    #[serde(default)]
    pub answer: Option<String>,

    /// Template that judges generated code against the safety policy.
    #[serde(default)]
    pub critique: Option<String>,
}

/// Knowledge store configuration for the bundled in-memory store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory of documents loaded at startup.
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: String,

    /// Number of documents returned per search.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// File extensions (without the dot) that are loaded as documents.
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,

    /// Extra metadata attached to every loaded document.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            knowledge_dir: default_knowledge_dir(),
            top_k: default_top_k(),
            extensions: default_extensions(),
            metadata: BTreeMap::new(),
        }
    }
}

fn default_knowledge_dir() -> String {
    "knowledge".to_string()
}

fn default_top_k() -> usize {
    4
}

fn default_extensions() -> Vec<String> {
    ["md", "txt", "py", "rs"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g. "info", "debug", "trace").
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from a TOML file at the given path using async I/O.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = tokio::fs::read_to_string(path).await?;
        let config: AppConfig = toml::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Validation(format!(
                "llm.temperature must be in [0.0, 2.0], got {}",
                self.llm.temperature
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Validation(
                "llm.max_tokens must be non-zero".to_string(),
            ));
        }
        for (field, value) in [
            ("llm.condense_model", &self.llm.condense_model),
            ("llm.critic_model", &self.llm.critic_model),
            ("llm.base_url", &self.llm.base_url),
        ] {
            if value.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::Validation(format!(
                    "{field} must not be empty when set"
                )));
            }
        }

        if self.pipeline.max_context_tokens == Some(0) {
            return Err(ConfigError::Validation(
                "pipeline.max_context_tokens must be non-zero when set".to_string(),
            ));
        }
        let lang = &self.pipeline.code_language;
        if lang.is_empty()
            || !lang
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '+' | '#' | '-'))
        {
            return Err(ConfigError::Validation(format!(
                "pipeline.code_language must be a non-empty tag of [A-Za-z0-9_+#-], got {lang:?}"
            )));
        }
        for (i, term) in self.pipeline.leak_terms.iter().enumerate() {
            if term.is_empty() {
                return Err(ConfigError::Validation(format!(
                    "pipeline.leak_terms[{i}] must not be empty"
                )));
            }
        }

        for (field, value) in [
            ("prompts.condense", &self.prompts.condense),
            ("prompts.answer", &self.prompts.answer),
            ("prompts.critique", &self.prompts.critique),
        ] {
            if value.as_deref().is_some_and(str::is_empty) {
                return Err(ConfigError::Validation(format!(
                    "{field} must not be empty when set"
                )));
            }
        }

        if self.store.top_k == 0 {
            return Err(ConfigError::Validation(
                "store.top_k must be at least 1".to_string(),
            ));
        }
        if self.store.extensions.is_empty() {
            return Err(ConfigError::Validation(
                "store.extensions must list at least one extension".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::Validation(format!(
                "logging.level must be one of {:?}, got {:?}",
                valid_levels, self.logging.level
            )));
        }

        Ok(())
    }
}
