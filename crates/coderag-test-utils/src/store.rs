//! Canned document stores.

use std::sync::Mutex;

use coderag_core::BoxFuture;
use coderag_core::{Document, DocumentStore, StoreError};

/// Returns the same documents for every query and records the queries.
pub struct StaticStore {
    documents: Vec<Document>,
    queries: Mutex<Vec<String>>,
}

impl StaticStore {
    pub fn new(documents: Vec<Document>) -> Self {
        Self {
            documents,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Every query received so far, in call order.
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().expect("store lock poisoned").clone()
    }

    fn record(&self, query: &str) -> Vec<Document> {
        self.queries
            .lock()
            .expect("store lock poisoned")
            .push(query.to_string());
        self.documents.clone()
    }
}

impl DocumentStore for StaticStore {
    fn search(&self, query: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.record(query))
    }

    fn search_async<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        Box::pin(async move { Ok(self.record(query)) })
    }
}

/// Fails every search with [`StoreError::Unavailable`].
pub struct FailingStore {
    message: String,
}

impl FailingStore {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
        }
    }
}

impl DocumentStore for FailingStore {
    fn search(&self, _query: &str) -> Result<Vec<Document>, StoreError> {
        Err(StoreError::Unavailable(self.message.clone()))
    }

    fn search_async<'a>(
        &'a self,
        _query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        Box::pin(async move { Err(StoreError::Unavailable(self.message.clone())) })
    }
}
