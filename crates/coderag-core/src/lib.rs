#![deny(unsafe_code)]

//! coderag core library.
//!
//! Conversational retrieval-augmented code generation: a chat turn is
//! condensed into a standalone query, documents are retrieved and trimmed to
//! a token budget, an answer model writes code grounded in them, and a
//! safety critic reviews the code before it is returned.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future, used as the return type of async
/// trait methods that must stay object-safe (`&dyn Trait`, `Arc<dyn Trait>`).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Chat history types and prompt serialization.
pub mod chat;
/// Chat-completions providers (OpenAI-compatible, Anthropic).
pub mod llm;
/// The `LanguageModel` capability and its provider-backed implementation.
pub mod model;
/// Condense, retrieve, budget, synthesize, parse, critique.
pub mod pipeline;
/// Prompt templates with `{placeholder}` substitution.
pub mod prompt;
/// Document store trait and the in-memory adapter.
pub mod store;

pub use chat::{ChatTurn, HistoryFormatter, Role};
pub use model::{LanguageModel, ProviderModel, estimate_tokens};
pub use pipeline::{
    BuildError, CodePipeline, DocumentFetcher, PipelineError, PipelineOptions, PipelineRequest,
    PipelineResult, SafetyVerdict, Stage, StoreFetcher,
};
pub use prompt::{PromptSet, PromptTemplate};
pub use store::{Document, DocumentStore, InMemoryStore, StoreError};
