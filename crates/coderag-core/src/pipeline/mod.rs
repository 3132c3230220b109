//! The code-generation pipeline and its components.
//!
//! Each component is usable on its own; [`CodePipeline`] wires them together.

pub mod budget;
pub mod condense;
pub mod critic;
pub mod error;
pub mod fetch;
pub mod orchestrator;
pub mod parse;
pub mod result;
pub mod synthesize;

pub use budget::ContextBudgeter;
pub use condense::{CondensedQuery, QueryCondenser};
pub use critic::{SafetyCritic, SafetyVerdict};
pub use error::{BuildError, PipelineError, Stage, UpstreamError};
pub use fetch::{DocumentFetcher, StoreFetcher};
pub use orchestrator::{CodePipeline, CodePipelineBuilder, PipelineOptions, PipelineState};
pub use parse::{NO_CODE_SENTINEL, OutputParser, ParsedOutput};
pub use result::{PipelineRequest, PipelineResult};
pub use synthesize::AnswerSynthesizer;
