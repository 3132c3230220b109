//! Prompt templates.
//!
//! Templates are static text loaded once at startup. The built-in set is
//! compiled into the binary; any template can be replaced by a file named in
//! the `[prompts]` config section. Placeholders are written `{name}`.

use std::path::{Path, PathBuf};

use coderag_config::PromptsConfig;
use tracing::debug;

const CONDENSE_DEFAULT: &str = include_str!("../prompts/condense.txt");
const ANSWER_DEFAULT: &str = include_str!("../prompts/answer.txt");
const CRITIQUE_DEFAULT: &str = include_str!("../prompts/critique.txt");

/// Placeholders the condense template must contain.
pub const CONDENSE_VARS: &[&str] = &["chat_history", "question"];
/// Placeholders the answer template must contain.
pub const ANSWER_VARS: &[&str] = &["context", "question", "chat_history"];
/// Placeholders the critique template must contain.
pub const CRITIQUE_VARS: &[&str] = &["code"];

/// Errors raised while loading prompt templates.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("failed to read {name} prompt template at {}: {source}", path.display())]
    Read {
        name: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{name} prompt template is missing the {{{placeholder}}} placeholder")]
    MissingPlaceholder { name: String, placeholder: String },
}

/// A named prompt template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    name: String,
    text: String,
}

impl PromptTemplate {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Check that every placeholder in `vars` occurs in the template.
    pub fn require(&self, vars: &[&str]) -> Result<(), PromptError> {
        for var in vars {
            if !self.text.contains(&format!("{{{var}}}")) {
                return Err(PromptError::MissingPlaceholder {
                    name: self.name.clone(),
                    placeholder: (*var).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Substitute `{name}` placeholders in one left-to-right pass.
    ///
    /// Substituted values are never re-scanned, and braces that do not wrap
    /// a known placeholder are copied through unchanged.
    pub fn render(&self, vars: &[(&str, &str)]) -> String {
        let mut out = String::with_capacity(self.text.len());
        let mut rest = self.text.as_str();

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) if is_placeholder(&after[..close]) => {
                    let key = &after[..close];
                    match vars.iter().find(|(k, _)| *k == key) {
                        Some((_, value)) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                _ => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        out
    }
}

fn is_placeholder(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// The three templates the pipeline needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub condense: PromptTemplate,
    pub answer: PromptTemplate,
    pub critique: PromptTemplate,
}

impl PromptSet {
    /// The compiled-in templates.
    pub fn builtin() -> Self {
        Self {
            condense: PromptTemplate::new("condense", CONDENSE_DEFAULT),
            answer: PromptTemplate::new("answer", ANSWER_DEFAULT),
            critique: PromptTemplate::new("critique", CRITIQUE_DEFAULT),
        }
    }

    /// Load templates, reading any overrides named in `config`, and validate
    /// their placeholders.
    pub async fn load(config: &PromptsConfig) -> Result<Self, PromptError> {
        let mut set = Self::builtin();
        if let Some(path) = &config.condense {
            set.condense = read_template("condense", Path::new(path)).await?;
        }
        if let Some(path) = &config.answer {
            set.answer = read_template("answer", Path::new(path)).await?;
        }
        if let Some(path) = &config.critique {
            set.critique = read_template("critique", Path::new(path)).await?;
        }
        set.validate()?;
        Ok(set)
    }

    /// Check that every template carries its required placeholders.
    pub fn validate(&self) -> Result<(), PromptError> {
        self.condense.require(CONDENSE_VARS)?;
        self.answer.require(ANSWER_VARS)?;
        self.critique.require(CRITIQUE_VARS)
    }
}

impl Default for PromptSet {
    fn default() -> Self {
        Self::builtin()
    }
}

async fn read_template(name: &str, path: &Path) -> Result<PromptTemplate, PromptError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| PromptError::Read {
            name: name.to_string(),
            path: path.to_path_buf(),
            source,
        })?;
    debug!(template = name, path = %path.display(), "prompt template override loaded");
    Ok(PromptTemplate::new(name, text))
}
