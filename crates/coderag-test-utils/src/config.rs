//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use coderag_config::{AppConfig, LlmProviderKind};

/// Fluent builder for [`AppConfig`] in tests.
///
/// # Example
///
/// ```ignore
/// let config = TestConfigBuilder::new()
///     .max_context_tokens(100)
///     .include_source_documents(true)
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: AppConfig::default(),
        }
    }

    pub fn provider(mut self, provider: LlmProviderKind) -> Self {
        self.config.llm.provider = provider;
        self
    }

    pub fn model(mut self, model: &str) -> Self {
        self.config.llm.model = model.to_string();
        self
    }

    pub fn api_key(mut self, key: &str) -> Self {
        self.config.llm.api_key = key.to_string();
        self
    }

    pub fn max_context_tokens(mut self, limit: usize) -> Self {
        self.config.pipeline.max_context_tokens = Some(limit);
        self
    }

    pub fn include_source_documents(mut self, include: bool) -> Self {
        self.config.pipeline.include_source_documents = include;
        self
    }

    pub fn include_generated_question(mut self, include: bool) -> Self {
        self.config.pipeline.include_generated_question = include;
        self
    }

    pub fn include_safety_verdict(mut self, include: bool) -> Self {
        self.config.pipeline.include_safety_verdict = include;
        self
    }

    pub fn require_context(mut self, require: bool) -> Self {
        self.config.pipeline.require_context = require;
        self
    }

    pub fn knowledge_dir(mut self, dir: &str) -> Self {
        self.config.store.knowledge_dir = dir.to_string();
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.config.store.top_k = top_k;
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
