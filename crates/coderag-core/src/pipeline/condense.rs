//! Query condensation: chat history + new request → standalone search query.

use std::fmt;

use tracing::debug;

use crate::chat::{ChatTurn, HistoryFormatter};
use crate::llm::LlmError;
use crate::model::LanguageModel;
use crate::prompt::PromptTemplate;

/// A standalone rephrasing of the user's request, used for retrieval and
/// synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CondensedQuery(String);

impl CondensedQuery {
    pub fn new(query: impl Into<String>) -> Self {
        Self(query.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display form of the query with every `leak_terms` entry removed.
    ///
    /// Cosmetic only: it hides implementation words from the question shown
    /// back to the user. It is not a safety control; generated code is gated
    /// by the safety critic.
    pub fn sanitized(&self, leak_terms: &[String]) -> String {
        leak_terms
            .iter()
            .fold(self.0.clone(), |query, term| query.replace(term.as_str(), ""))
    }
}

impl fmt::Display for CondensedQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rewrites a conversational turn into a standalone query with one model call.
pub struct QueryCondenser {
    template: PromptTemplate,
    formatter: HistoryFormatter,
}

impl QueryCondenser {
    pub fn new(template: PromptTemplate, formatter: HistoryFormatter) -> Self {
        Self {
            template,
            formatter,
        }
    }

    /// The prompt sent to the model.
    pub fn prompt(&self, question: &str, history: &[ChatTurn]) -> String {
        let chat_history = (self.formatter)(history);
        self.template.render(&[
            ("chat_history", chat_history.as_str()),
            ("question", question),
        ])
    }

    /// Turn the model's completion into a query.
    ///
    /// Surrounding whitespace is trimmed; a blank completion falls back to the
    /// user's own question so the query is never empty.
    pub fn finish(&self, question: &str, completion: &str) -> CondensedQuery {
        let trimmed = completion.trim();
        if trimmed.is_empty() {
            debug!("condense returned a blank completion, using the question as-is");
            CondensedQuery::new(question)
        } else {
            CondensedQuery::new(trimmed)
        }
    }

    /// Condense, blocking the calling thread.
    pub fn condense(
        &self,
        model: &dyn LanguageModel,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<CondensedQuery, LlmError> {
        let completion = model.generate(&self.prompt(question, history))?;
        Ok(self.finish(question, &completion))
    }

    /// Condense on the async runtime.
    pub async fn condense_async(
        &self,
        model: &dyn LanguageModel,
        question: &str,
        history: &[ChatTurn],
    ) -> Result<CondensedQuery, LlmError> {
        let prompt = self.prompt(question, history);
        let completion = model.generate_async(&prompt).await?;
        Ok(self.finish(question, &completion))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::BoxFuture;
    use crate::chat::format_transcript;
    use crate::prompt::PromptSet;

    struct FixedModel {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FixedModel {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    impl LanguageModel for FixedModel {
        fn name(&self) -> &str {
            "fixed"
        }

        fn generate(&self, prompt: &str) -> Result<String, LlmError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }

        fn generate_async<'a>(
            &'a self,
            prompt: &'a str,
        ) -> BoxFuture<'a, Result<String, LlmError>> {
            Box::pin(async move { self.generate(prompt) })
        }
    }

    fn condenser() -> QueryCondenser {
        QueryCondenser::new(PromptSet::builtin().condense, Arc::new(format_transcript))
    }

    #[test]
    fn test_prompt_embeds_history_and_question() {
        let history = vec![ChatTurn::user("make a todo app"), ChatTurn::assistant("done")];
        let prompt = condenser().prompt("add a delete button", &history);
        assert!(prompt.contains("\nHuman: make a todo app\nAssistant: done"));
        assert!(prompt.contains("Follow-up request: add a delete button"));
    }

    #[test]
    fn test_condense_returns_completion() {
        let model = FixedModel::new("  streamlit todo app with delete button\n");
        let query = condenser().condense(&model, "add delete", &[]).unwrap();
        assert_eq!(query.as_str(), "streamlit todo app with delete button");
        assert_eq!(model.prompts.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_blank_completion_falls_back_to_question() {
        let model = FixedModel::new(" \n ");
        let query = condenser().condense(&model, "build me a todo list app", &[]).unwrap();
        assert_eq!(query.as_str(), "build me a todo list app");
    }

    #[test]
    fn test_non_empty_completions_never_yield_empty_query() {
        for reply in ["x", " x ", "\t", "None", "```"] {
            let model = FixedModel::new(reply);
            let query = condenser().condense(&model, "q", &[]).unwrap();
            assert!(!query.as_str().is_empty(), "empty query for {reply:?}");
        }
    }

    #[tokio::test]
    async fn test_async_condense_matches_blocking() {
        let model = FixedModel::new("standalone query");
        let history = vec![ChatTurn::user("hi")];
        let blocking = condenser().condense(&model, "q", &history).unwrap();
        let suspended = condenser()
            .condense_async(&model, "q", &history)
            .await
            .unwrap();
        assert_eq!(blocking, suspended);
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0], prompts[1]);
    }

    #[test]
    fn test_sanitized_strips_leak_terms() {
        let query = CondensedQuery::new("build a streamlit todo app in python");
        let terms = vec!["streamlit".to_string(), "python".to_string()];
        assert_eq!(query.sanitized(&terms), "build a  todo app in ");
        // The raw form is untouched
        assert_eq!(query.as_str(), "build a streamlit todo app in python");
    }

    #[test]
    fn test_sanitized_is_case_sensitive() {
        let query = CondensedQuery::new("Python app");
        assert_eq!(query.sanitized(&["python".to_string()]), "Python app");
    }
}
