use std::sync::Arc;

use tracing::{debug, warn};

use docqa_core::traits::{ContextSource, Embedder};
use docqa_core::types::{Chunk, SearchHit};

use crate::index::VectorIndex;

/// Top-k similarity lookups. Never fails: problems are logged and turn
/// into an empty result.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self { embedder }
    }

    pub fn similarity_query(&self, index: Option<&VectorIndex>, question: &str, k: usize) -> Vec<SearchHit> {
        let Some(index) = index else {
            debug!("no index loaded; skipping retrieval");
            return Vec::new();
        };
        if index.is_empty() || k == 0 {
            return Vec::new();
        }
        match index.query(self.embedder.as_ref(), question, k) {
            Ok(hits) => {
                debug!(k, hits = hits.len(), "similarity query");
                hits
            }
            Err(e) => {
                warn!("retrieval failed: {:#}", e);
                Vec::new()
            }
        }
    }

    /// A context source bound to `index` and `k`, for the answer composer.
    pub fn as_queryable<'a>(&self, index: Option<&'a VectorIndex>, k: usize) -> Option<QueryHandle<'a>> {
        index.map(|index| QueryHandle { index, embedder: Arc::clone(&self.embedder), k })
    }
}

pub struct QueryHandle<'a> {
    index: &'a VectorIndex,
    embedder: Arc<dyn Embedder>,
    k: usize,
}

impl QueryHandle<'_> {
    pub fn hits(&self, question: &str) -> Vec<SearchHit> {
        Retriever { embedder: Arc::clone(&self.embedder) }.similarity_query(Some(self.index), question, self.k)
    }
}

impl ContextSource for QueryHandle<'_> {
    fn context_for(&self, question: &str) -> Vec<Chunk> {
        self.hits(question).into_iter().map(|h| h.chunk).collect()
    }
}
