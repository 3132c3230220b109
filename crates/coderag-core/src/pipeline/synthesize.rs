//! Answer synthesis: stuff the retrieved documents into one generation call.

use crate::llm::LlmError;
use crate::model::LanguageModel;
use crate::prompt::PromptTemplate;
use crate::store::Document;

use super::condense::CondensedQuery;

/// Builds the grounded answer prompt and returns the model's raw text.
pub struct AnswerSynthesizer {
    template: PromptTemplate,
    separator: String,
}

impl AnswerSynthesizer {
    pub fn new(template: PromptTemplate, separator: impl Into<String>) -> Self {
        Self {
            template,
            separator: separator.into(),
        }
    }

    /// Render documents into the context block, in order.
    ///
    /// A document with a `source` metadata entry is prefixed with
    /// `Source: <source>` on its own line.
    pub fn format_documents(&self, documents: &[Document]) -> String {
        documents
            .iter()
            .map(|doc| match doc.source() {
                Some(source) => format!("Source: {source}\n{}", doc.content),
                None => doc.content.clone(),
            })
            .collect::<Vec<_>>()
            .join(&self.separator)
    }

    /// The prompt sent to the model. `chat_history` is already serialized.
    pub fn prompt(&self, query: &CondensedQuery, documents: &[Document], chat_history: &str) -> String {
        let context = self.format_documents(documents);
        self.template.render(&[
            ("context", context.as_str()),
            ("question", query.as_str()),
            ("chat_history", chat_history),
        ])
    }

    /// Synthesize, blocking the calling thread.
    pub fn synthesize(
        &self,
        model: &dyn LanguageModel,
        query: &CondensedQuery,
        documents: &[Document],
        chat_history: &str,
    ) -> Result<String, LlmError> {
        model.generate(&self.prompt(query, documents, chat_history))
    }

    /// Synthesize on the async runtime.
    pub async fn synthesize_async(
        &self,
        model: &dyn LanguageModel,
        query: &CondensedQuery,
        documents: &[Document],
        chat_history: &str,
    ) -> Result<String, LlmError> {
        let prompt = self.prompt(query, documents, chat_history);
        model.generate_async(&prompt).await
    }
}
