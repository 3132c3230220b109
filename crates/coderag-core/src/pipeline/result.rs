//! Pipeline input and output types.

use serde::{Deserialize, Serialize};

use crate::chat::ChatTurn;
use crate::store::Document;

use super::critic::SafetyVerdict;

/// One invocation's input: the new user turn plus the conversation so far.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub question: String,
    #[serde(default)]
    pub chat_history: Vec<ChatTurn>,
}

impl PipelineRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            chat_history: Vec::new(),
        }
    }

    pub fn with_history(mut self, chat_history: Vec<ChatTurn>) -> Self {
        self.chat_history = chat_history;
        self
    }
}

/// The assembled answer.
///
/// Only built once every step has finished, so callers either get all of it
/// or an error. Optional fields the pipeline was not asked to include are
/// `None` and left out of the serialized form entirely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineResult {
    code: Option<String>,
    explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source_documents: Option<Vec<Document>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_question: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    safety_verdict: Option<SafetyVerdict>,
    #[serde(skip)]
    approved: bool,
}

impl PipelineResult {
    pub(crate) fn new(
        code: Option<String>,
        explanation: Option<String>,
        verdict: SafetyVerdict,
    ) -> Self {
        Self {
            code,
            explanation,
            source_documents: None,
            generated_question: None,
            safety_verdict: None,
            approved: verdict.is_safe(),
        }
    }

    pub(crate) fn with_source_documents(mut self, documents: Vec<Document>) -> Self {
        self.source_documents = Some(documents);
        self
    }

    pub(crate) fn with_generated_question(mut self, question: String) -> Self {
        self.generated_question = Some(question);
        self
    }

    pub(crate) fn with_safety_verdict(mut self, verdict: SafetyVerdict) -> Self {
        self.safety_verdict = Some(verdict);
        self
    }

    /// Extracted code, exactly as the model wrote it.
    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Documents that went into the answer prompt, when requested.
    pub fn source_documents(&self) -> Option<&[Document]> {
        self.source_documents.as_deref()
    }

    /// The condensed query with leak terms removed, when requested.
    pub fn generated_question(&self) -> Option<&str> {
        self.generated_question.as_deref()
    }

    /// The critic's verdict, when requested.
    pub fn safety_verdict(&self) -> Option<SafetyVerdict> {
        self.safety_verdict
    }

    /// True only when code was produced and the critic judged it safe.
    ///
    /// Available whether or not the verdict itself is included.
    pub fn is_approved(&self) -> bool {
        self.approved
    }
}
