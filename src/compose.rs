//! Context composition: one merged result set per query.
//!
//! Persisted search results come first, then live-context entries in
//! discovery order, minus very short snippets and exact-text duplicates.
//! Failures on the store branch propagate; the live branch cannot fail
//! (absence is already encoded as empty contributions).

use std::path::PathBuf;
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::error::Result;
use crate::store::EmbeddingStore;
use crate::workspace::{gather_live_context, LiveOrigin, WorkspaceState};

/// Live snippets of this many characters or fewer carry too little signal
/// to be worth sending to the model.
pub const MIN_SNIPPET_CHARS: usize = 30;

const DEFAULT_MAX_RESULTS: usize = 12;
const DEFAULT_WINDOW_CHARS: usize = 8000;

/// Where a retrieved piece of content came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentOrigin {
    /// A persisted document, by store id.
    Stored { id: String },
    /// A file the user explicitly attached.
    AttachedFile(PathBuf),
    /// The caret-centered window of the focused buffer.
    FocusedWindow,
}

/// One entry of the final merged result set.
#[derive(Debug, Clone)]
pub struct RetrievedContent {
    pub text: String,
    /// Cosine similarity for stored results; live context carries none.
    pub score: Option<f64>,
    pub origin: ContentOrigin,
}

/// Merges persisted search results with live editor context.
pub struct ContextComposer {
    store: Arc<EmbeddingStore>,
    embedder: Arc<dyn Embedder>,
    workspace: Arc<dyn WorkspaceState>,
    max_results: usize,
    window_chars: usize,
}

impl ContextComposer {
    pub fn new(
        store: Arc<EmbeddingStore>,
        embedder: Arc<dyn Embedder>,
        workspace: Arc<dyn WorkspaceState>,
    ) -> Self {
        Self {
            store,
            embedder,
            workspace,
            max_results: DEFAULT_MAX_RESULTS,
            window_chars: DEFAULT_WINDOW_CHARS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_window_chars(mut self, window_chars: usize) -> Self {
        self.window_chars = window_chars;
        self
    }

    /// Retrieve grounding content for one query. Stateless across queries.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedContent>> {
        let query_vector = self.embedder.embed(query).await?;
        let matches = self.store.search(&query_vector, self.max_results).await?;

        let mut results: Vec<RetrievedContent> = matches
            .into_iter()
            .map(|m| RetrievedContent {
                text: m.document.text,
                score: Some(m.score),
                origin: ContentOrigin::Stored { id: m.id },
            })
            .collect();

        for entry in gather_live_context(self.workspace.as_ref(), self.window_chars) {
            if entry.text.chars().count() <= MIN_SNIPPET_CHARS {
                continue;
            }
            if results.iter().any(|r| r.text == entry.text) {
                continue;
            }
            results.push(RetrievedContent {
                text: entry.text,
                score: None,
                origin: match entry.origin {
                    LiveOrigin::AttachedFile(path) => ContentOrigin::AttachedFile(path),
                    LiveOrigin::FocusedWindow => ContentOrigin::FocusedWindow,
                },
            });
        }

        Ok(results)
    }
}
