//! A scripted [`LanguageModel`] for deterministic pipeline tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use coderag_core::BoxFuture;
use coderag_core::LanguageModel;
use coderag_core::llm::LlmError;

/// Replies with queued completions in order and records every prompt.
///
/// Token costs can be pinned per text with [`ScriptedModel::with_token_cost`];
/// anything else is counted as one token per whitespace-separated word. An
/// exhausted script fails the call, so an unexpected extra call shows up as
/// an error rather than a silent default.
pub struct ScriptedModel {
    name: String,
    replies: Mutex<VecDeque<Result<String, LlmError>>>,
    prompts: Mutex<Vec<String>>,
    costs: HashMap<String, usize>,
    delay: Option<Duration>,
}

impl ScriptedModel {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
            costs: HashMap::new(),
            delay: None,
        }
    }

    /// A model that answers each call with the next entry of `replies`.
    pub fn with_replies(name: &str, replies: &[&str]) -> Self {
        let model = Self::new(name);
        for reply in replies {
            model.push_reply(reply);
        }
        model
    }

    pub fn push_reply(&self, reply: &str) {
        self.replies
            .lock()
            .expect("script lock poisoned")
            .push_back(Ok(reply.to_string()));
    }

    /// Queue a failure for the next call.
    pub fn push_error(&self, error: LlmError) {
        self.replies
            .lock()
            .expect("script lock poisoned")
            .push_back(Err(error));
    }

    /// Pin the token cost of an exact text.
    pub fn with_token_cost(mut self, text: &str, tokens: usize) -> Self {
        self.costs.insert(text.to_string(), tokens);
        self
    }

    /// Sleep before every async reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().expect("script lock poisoned").clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().expect("script lock poisoned").len()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("script lock poisoned").len()
    }

    fn next(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts
            .lock()
            .expect("script lock poisoned")
            .push(prompt.to_string());
        self.replies
            .lock()
            .expect("script lock poisoned")
            .pop_front()
            .unwrap_or_else(|| Err(LlmError::Request(format!("{}: script exhausted", self.name))))
    }
}

impl LanguageModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.next(prompt)
    }

    fn generate_async<'a>(&'a self, prompt: &'a str) -> BoxFuture<'a, Result<String, LlmError>> {
        Box::pin(async move {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.next(prompt)
        })
    }

    fn count_tokens(&self, text: &str) -> usize {
        self.costs
            .get(text)
            .copied()
            .unwrap_or_else(|| text.split_whitespace().count())
    }
}
