//! Document store abstraction and the bundled in-memory adapter.
//!
//! The pipeline only needs "query in, relevance-ordered passages out".
//! Production deployments plug in their own [`DocumentStore`]; the
//! [`InMemoryStore`] serves the CLI and tests with a keyword-scored corpus
//! loaded from a knowledge directory.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::BoxFuture;

/// A retrieved passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// Passage text.
    pub content: String,
    /// Arbitrary metadata; `source` identifies where the passage came from.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The `source` metadata entry, if any.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").map(String::as_str)
    }
}

/// Errors from a document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("search failed: {0}")]
    Search(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A searchable knowledge store.
///
/// Results are ordered most relevant first. Implementations are shared across
/// invocations and must be safe for concurrent use.
pub trait DocumentStore: Send + Sync {
    /// Search, blocking the calling thread.
    fn search(&self, query: &str) -> Result<Vec<Document>, StoreError>;

    /// Search on the async runtime.
    fn search_async<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>>;
}

struct Entry {
    document: Document,
    lowered: String,
}

/// Keyword-scored, in-memory document store.
pub struct InMemoryStore {
    entries: Vec<Entry>,
    top_k: usize,
}

impl InMemoryStore {
    /// Create an empty store returning at most `top_k` documents per search.
    pub fn new(top_k: usize) -> Self {
        Self {
            entries: Vec::new(),
            top_k: top_k.max(1),
        }
    }

    /// Add a document to the corpus.
    pub fn add(&mut self, document: Document) {
        let lowered = document.content.to_lowercase();
        self.entries.push(Entry { document, lowered });
    }

    /// Build a store from the `[store]` config section, loading the
    /// knowledge directory if it exists.
    pub fn from_config(config: &coderag_config::StoreConfig) -> Result<Self, StoreError> {
        let mut store = Self::new(config.top_k);
        let root = Path::new(&config.knowledge_dir);
        let extensions: Vec<&str> = config.extensions.iter().map(String::as_str).collect();
        let loaded = store.load_dir(root, &extensions, &config.metadata)?;
        debug!(dir = %root.display(), documents = loaded, "knowledge directory loaded");
        Ok(store)
    }

    /// Load every file under `root` whose extension is in `extensions`.
    ///
    /// Each file becomes one document with `source` set to its path relative
    /// to `root`, plus the given extra metadata. Hidden directories, `target`
    /// and `node_modules` are skipped, as are files that are not valid UTF-8.
    /// Returns the number of documents added.
    pub fn load_dir(
        &mut self,
        root: &Path,
        extensions: &[&str],
        metadata: &BTreeMap<String, String>,
    ) -> Result<usize, StoreError> {
        let mut count = 0;
        walk_dir(root, extensions, &mut |path, content| {
            let source = path.strip_prefix(root).unwrap_or(path);
            let mut document = Document::new(content);
            document.metadata = metadata.clone();
            document
                .metadata
                .insert("source".to_string(), source.display().to_string());
            self.add(document);
            count += 1;
        })?;
        Ok(count)
    }

    /// Number of documents in the corpus.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Is the corpus empty?
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn rank(&self, query: &str) -> Vec<Document> {
        let query = query.to_lowercase();
        let terms: Vec<&str> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| t.len() >= 2)
            .collect();

        let mut scored: Vec<(usize, &Document)> = self
            .entries
            .iter()
            .filter_map(|entry| {
                let score: usize = terms.iter().map(|t| entry.lowered.matches(t).count()).sum();
                (score > 0).then_some((score, &entry.document))
            })
            .collect();

        // Stable sort keeps insertion order among equal scores
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored
            .into_iter()
            .take(self.top_k)
            .map(|(_, doc)| doc.clone())
            .collect()
    }
}

impl DocumentStore for InMemoryStore {
    fn search(&self, query: &str) -> Result<Vec<Document>, StoreError> {
        Ok(self.rank(query))
    }

    fn search_async<'a>(
        &'a self,
        query: &'a str,
    ) -> BoxFuture<'a, Result<Vec<Document>, StoreError>> {
        Box::pin(async move { Ok(self.rank(query)) })
    }
}

/// Walk a directory recursively in sorted order, calling `visitor` for each
/// file with an allowed extension.
fn walk_dir(
    dir: &Path,
    extensions: &[&str],
    visitor: &mut dyn FnMut(&Path, String),
) -> std::io::Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }

    let mut paths = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();

    for path in paths {
        if let Some(name) = path.file_name().and_then(|n| n.to_str())
            && (name.starts_with('.') || name == "target" || name == "node_modules")
        {
            continue;
        }

        if path.is_dir() {
            walk_dir(&path, extensions, visitor)?;
        } else if let Some(ext) = path.extension().and_then(|e| e.to_str())
            && extensions.contains(&ext)
        {
            match std::fs::read_to_string(&path) {
                Ok(content) => visitor(&path, content),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable knowledge file")
                }
            }
        }
    }
    Ok(())
}
