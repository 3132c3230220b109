//! Retrieval seam between the pipeline and a document store.

use std::sync::Arc;

use tracing::debug;

use crate::BoxFuture;
use crate::store::{Document, DocumentStore, StoreError};

use super::condense::CondensedQuery;

/// Fetches relevance-ordered documents for a condensed query.
///
/// The pipeline always retrieves through this trait, so a fetcher may wrap a
/// store with its own filtering or re-ranking as long as the order it returns
/// is most relevant first.
pub trait DocumentFetcher: Send + Sync {
    /// Fetch, blocking the calling thread.
    fn fetch(&self, query: &CondensedQuery) -> Result<Vec<Document>, StoreError>;

    /// Fetch on the async runtime.
    fn fetch_async<'a>(
        &'a self,
        query: &'a CondensedQuery,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>>;
}

/// A [`DocumentFetcher`] that passes the query straight to a store.
#[derive(Clone)]
pub struct StoreFetcher {
    store: Arc<dyn DocumentStore>,
}

impl StoreFetcher {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

impl DocumentFetcher for StoreFetcher {
    fn fetch(&self, query: &CondensedQuery) -> Result<Vec<Document>, StoreError> {
        let documents = self.store.search(query.as_str())?;
        debug!(count = documents.len(), "fetched documents");
        Ok(documents)
    }

    fn fetch_async<'a>(
        &'a self,
        query: &'a CondensedQuery,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        Box::pin(async move {
            let documents = self.store.search_async(query.as_str()).await?;
            debug!(count = documents.len(), "fetched documents");
            Ok(documents)
        })
    }
}
