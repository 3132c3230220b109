//! Context budgeting: keep retrieved documents under a token ceiling.
//!
//! Documents arrive most relevant first, so trimming always removes from the
//! tail: the output is a prefix of the input, never reordered and never a
//! gapped subset. Costs come from the answer model's token counter.

use tracing::{debug, warn};

use crate::model::LanguageModel;
use crate::store::Document;

/// Trims a document sequence to fit a token limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextBudgeter {
    limit: Option<usize>,
}

impl ContextBudgeter {
    /// `None` disables trimming.
    pub fn new(limit: Option<usize>) -> Self {
        Self { limit }
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    /// Drop tail documents until the summed token cost is within the limit.
    ///
    /// Costs are counted once per document, front to back. If even the first
    /// document exceeds the limit the result is empty.
    pub fn reduce(&self, mut documents: Vec<Document>, model: &dyn LanguageModel) -> Vec<Document> {
        let Some(limit) = self.limit else {
            return documents;
        };

        let costs: Vec<usize> = documents
            .iter()
            .map(|doc| model.count_tokens(&doc.content))
            .collect();
        let mut total: usize = costs.iter().sum();
        let mut keep = documents.len();

        while total > limit && keep > 0 {
            keep -= 1;
            total -= costs[keep];
        }

        if keep < documents.len() {
            debug!(
                kept = keep,
                dropped = documents.len() - keep,
                tokens = total,
                limit,
                "trimmed retrieved documents to the context budget"
            );
            if keep == 0 {
                warn!(limit, "no retrieved document fits the context budget");
            }
            documents.truncate(keep);
        }
        documents
    }
}
