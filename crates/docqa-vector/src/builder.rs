//! Batched, paced construction of a [`VectorIndex`] followed by one persist.
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use docqa_core::config::IndexingSettings;
use docqa_core::traits::Embedder;
use docqa_core::types::Chunk;

use crate::index::VectorIndex;
use crate::store::IndexStore;

/// Waits between embedding batches.
pub trait Pacer: Send + Sync {
    fn pause(&self, delay: Duration);
}

pub struct ThreadPacer;

impl Pacer for ThreadPacer {
    fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Indexing stopped early. `partial` holds what was embedded before the
/// failure and was NOT persisted.
#[derive(Debug, Error)]
#[error("indexing failed after {processed} chunks: {source}")]
pub struct IndexBuildError {
    pub partial: Option<VectorIndex>,
    pub processed: usize,
    pub source: anyhow::Error,
}

pub struct IndexBuilder {
    embedder: Arc<dyn Embedder>,
    store: IndexStore,
    batch_size: usize,
    pacing: Duration,
    pacer: Arc<dyn Pacer>,
    show_progress: bool,
}

impl IndexBuilder {
    pub fn new(embedder: Arc<dyn Embedder>, store: IndexStore, settings: &IndexingSettings) -> Self {
        Self {
            embedder,
            store,
            batch_size: settings.batch_size.max(1),
            pacing: settings.pacing(),
            pacer: Arc::new(ThreadPacer),
            show_progress: settings.show_progress,
        }
    }

    #[must_use]
    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    /// Embed `chunks` into `existing` (or a new index) and persist the result.
    ///
    /// Empty input returns `existing` as is, whatever embedder built it.
    /// Chunks already present (same id) are skipped. When nothing new remains
    /// the existing index is returned untouched, without embedding or saving.
    pub fn build_or_extend(
        &self,
        existing: Option<VectorIndex>,
        chunks: &[Chunk],
    ) -> Result<Option<VectorIndex>, IndexBuildError> {
        if chunks.is_empty() {
            debug!("empty input, index left as is");
            return Ok(existing);
        }
        if let Some(index) = &existing {
            if let Err(e) = index.ensure_same_space(self.embedder.as_ref()) {
                return Err(IndexBuildError { partial: existing, processed: 0, source: e.into() });
            }
        }
        let pending = self.pending(existing.as_ref(), chunks);
        if pending.is_empty() {
            debug!(given = chunks.len(), "no new chunks to index");
            return Ok(existing);
        }

        let total_batches = pending.len().div_ceil(self.batch_size);
        info!(chunks = pending.len(), batches = total_batches, batch_size = self.batch_size, "indexing started");
        let pb = self.progress_bar(pending.len());

        let mut index = existing;
        let mut processed = 0usize;
        for (batch_no, batch) in pending.chunks(self.batch_size).enumerate() {
            if batch_no > 0 {
                self.pacer.pause(self.pacing);
            }
            let step = if let Some(idx) = index.as_mut() {
                idx.add_chunks(self.embedder.as_ref(), batch).map(|_| ())
            } else {
                match VectorIndex::from_chunks(self.embedder.as_ref(), batch) {
                    Ok(first) => {
                        index = Some(first);
                        Ok(())
                    }
                    Err(e) => Err(e),
                }
            };
            if let Err(source) = step {
                pb.abandon_with_message("indexing failed");
                warn!(batch = batch_no + 1, processed, "embedding batch failed: {}", source);
                return Err(IndexBuildError { partial: index, processed, source });
            }
            processed += batch.len();
            pb.set_position(processed as u64);
            debug!(batch = batch_no + 1, of = total_batches, processed, "batch indexed");
        }
        pb.finish_with_message("indexed");

        if let Some(idx) = &index {
            if let Err(source) = self.store.save(idx) {
                return Err(IndexBuildError { partial: index, processed, source });
            }
        }
        info!(processed, "indexing completed");
        Ok(index)
    }

    /// Input order, minus chunks already indexed or repeated within `chunks`.
    fn pending(&self, existing: Option<&VectorIndex>, chunks: &[Chunk]) -> Vec<Chunk> {
        let mut seen = HashSet::new();
        chunks
            .iter()
            .filter(|c| {
                let id = c.id();
                !existing.is_some_and(|idx| idx.contains(&id)) && seen.insert(id)
            })
            .cloned()
            .collect()
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        pb
    }
}
