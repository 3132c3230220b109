//! Safety critic: a second model pass that approves or rejects generated code.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm::LlmError;
use crate::model::LanguageModel;
use crate::prompt::PromptTemplate;

/// Outcome of the safety review.
///
/// Defaults to [`SafetyVerdict::Unsafe`]: code is shown only on an explicit
/// approval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SafetyVerdict {
    Safe,
    #[default]
    Unsafe,
}

impl SafetyVerdict {
    pub fn is_safe(self) -> bool {
        self == SafetyVerdict::Safe
    }
}

impl fmt::Display for SafetyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyVerdict::Safe => write!(f, "safe"),
            SafetyVerdict::Unsafe => write!(f, "unsafe"),
        }
    }
}

/// Asks a model whether a code block is acceptable to show.
pub struct SafetyCritic {
    template: PromptTemplate,
}

impl SafetyCritic {
    pub fn new(template: PromptTemplate) -> Self {
        Self { template }
    }

    pub fn prompt(&self, code: &str) -> String {
        self.template.render(&[("code", code)])
    }

    /// Read a verdict from the critic's completion.
    ///
    /// Only a bare `SAFE` (any case, surrounding whitespace and one trailing
    /// `.` or `!` ignored) approves. Everything else, including chatty
    /// answers that merely contain the word, is a rejection.
    pub fn interpret(completion: &str) -> SafetyVerdict {
        let word = completion.trim();
        let word = word
            .strip_suffix(&['.', '!'][..])
            .unwrap_or(word)
            .trim_end();
        if word.eq_ignore_ascii_case("safe") {
            SafetyVerdict::Safe
        } else {
            debug!(completion = %completion.trim(), "critic did not approve");
            SafetyVerdict::Unsafe
        }
    }

    /// Review `code`, blocking the calling thread.
    pub fn critique(&self, model: &dyn LanguageModel, code: &str) -> Result<SafetyVerdict, LlmError> {
        let completion = model.generate(&self.prompt(code))?;
        Ok(Self::interpret(&completion))
    }

    /// Review `code` on the async runtime.
    pub async fn critique_async(
        &self,
        model: &dyn LanguageModel,
        code: &str,
    ) -> Result<SafetyVerdict, LlmError> {
        let prompt = self.prompt(code);
        let completion = model.generate_async(&prompt).await?;
        Ok(Self::interpret(&completion))
    }
}
