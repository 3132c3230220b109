//! Output extraction: pull the code block and its explanation out of the
//! model's free-form answer.
//!
//! The first fence opened with the language tag is matched non-greedily up to
//! the next closing fence; everything after that closing fence is the
//! explanation. No validation of the code itself happens here.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Code body the model uses to say "no code".
pub const NO_CODE_SENTINEL: &str = "None";

static PYTHON_FENCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```python(.*?)```(.*?)$").expect("valid regex"));

/// Code and explanation extracted from a raw answer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedOutput {
    pub code: Option<String>,
    pub explanation: Option<String>,
}

impl ParsedOutput {
    /// Neither code nor explanation.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn has_code(&self) -> bool {
        self.code.is_some()
    }
}

/// Pattern-based extractor for a fenced code block tagged with one language.
#[derive(Debug, Clone)]
pub struct OutputParser {
    pattern: Regex,
}

impl OutputParser {
    /// Parser for blocks opened with ```` ```<language> ````.
    pub fn new(language: &str) -> Result<Self, regex::Error> {
        let pattern = Regex::new(&format!(
            r"(?s)```{}(.*?)```(.*?)$",
            regex::escape(language)
        ))?;
        Ok(Self { pattern })
    }

    /// Split `raw` into code and explanation.
    ///
    /// Both are returned exactly as they appear (no trimming). A code body
    /// equal to [`NO_CODE_SENTINEL`], or no match at all, yields neither.
    pub fn parse(&self, raw: &str) -> ParsedOutput {
        let Some(caps) = self.pattern.captures(raw) else {
            return ParsedOutput::empty();
        };

        let code = caps.get(1).map_or("", |m| m.as_str());
        if code == NO_CODE_SENTINEL {
            return ParsedOutput::empty();
        }

        ParsedOutput {
            code: Some(code.to_string()),
            explanation: Some(caps.get(2).map_or("", |m| m.as_str()).to_string()),
        }
    }
}

impl Default for OutputParser {
    fn default() -> Self {
        Self {
            pattern: PYTHON_FENCE.clone(),
        }
    }
}
