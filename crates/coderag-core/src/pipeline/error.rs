//! Pipeline error taxonomy.

use std::fmt;

use crate::llm::LlmError;
use crate::prompt::PromptError;
use crate::store::StoreError;

/// The pipeline step that called an external service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Condense,
    Retrieve,
    Synthesize,
    Critique,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Condense => write!(f, "condense"),
            Stage::Retrieve => write!(f, "retrieve"),
            Stage::Synthesize => write!(f, "synthesize"),
            Stage::Critique => write!(f, "critique"),
        }
    }
}

/// A failure reported by the language model or the document store.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors surfaced by a pipeline invocation.
///
/// Upstream failures are passed through unmodified with the failing stage
/// attached; nothing is retried and no fallback answer is produced.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{stage} stage failed: {source}")]
    Upstream {
        stage: Stage,
        #[source]
        source: UpstreamError,
    },

    #[error("no documents left for synthesis ({retrieved} retrieved)")]
    NoContext { retrieved: usize },
}

impl PipelineError {
    /// The stage that failed, for upstream failures.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            PipelineError::Upstream { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Attach `stage` to an upstream error; for use with `map_err`.
    pub(crate) fn at<E: Into<UpstreamError>>(stage: Stage) -> impl FnOnce(E) -> Self {
        move |err| PipelineError::Upstream {
            stage,
            source: err.into(),
        }
    }
}

/// Errors raised while assembling a pipeline at startup.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error("invalid pipeline configuration: {0}")]
    Config(String),

    #[error("failed to load knowledge store: {0}")]
    Store(#[from] StoreError),
}
