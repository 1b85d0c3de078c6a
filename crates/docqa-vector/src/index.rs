//! In-memory vector index: flat cosine scan over every record.

use std::collections::HashSet;

use anyhow::Result;
use docqa_core::error::Error;
use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, ChunkId, SearchHit};

#[derive(Debug, Clone)]
pub struct VectorRecord {
    pub id: ChunkId,
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// All records of one deployment, tied to the embedder that produced them.
/// Records are append-only; search ties keep insertion order.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    embedder_id: String,
    dim: usize,
    records: Vec<VectorRecord>,
    ids: HashSet<ChunkId>,
}

impl VectorIndex {
    pub fn new(embedder_id: impl Into<String>, dim: usize) -> Self {
        Self { embedder_id: embedder_id.into(), dim, records: Vec::new(), ids: HashSet::new() }
    }

    /// Fresh index holding `chunks` embedded with `embedder`.
    pub fn from_chunks(embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<Self> {
        let mut index = Self::new(embedder.embedder_id(), embedder.dim());
        index.add_chunks(embedder, chunks)?;
        Ok(index)
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[VectorRecord] {
        &self.records
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn ensure_same_space(&self, embedder: &dyn Embedder) -> Result<(), Error> {
        if embedder.embedder_id() != self.embedder_id {
            return Err(Error::EmbeddingSpaceMismatch {
                expected: self.embedder_id.clone(),
                actual: embedder.embedder_id().to_string(),
            });
        }
        Ok(())
    }

    /// Embed `chunks` in one call and append them. Either every vector is
    /// accepted or none is. Returns the number of new records.
    pub fn add_chunks(&mut self, embedder: &dyn Embedder, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }
        self.ensure_same_space(embedder)?;
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != chunks.len() {
            return Err(Error::Provider(format!("expected {} vectors, got {}", chunks.len(), vectors.len())).into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::Operation(format!("vector dimension {} does not match index dimension {}", bad.len(), self.dim)).into());
        }
        let mut added = 0;
        for (chunk, vector) in chunks.iter().zip(vectors) {
            if self.insert(chunk.clone(), vector)? {
                added += 1;
            }
        }
        Ok(added)
    }

    /// Append one record. `Ok(false)` when a record with the same id exists.
    pub fn insert(&mut self, chunk: Chunk, vector: Vec<f32>) -> Result<bool, Error> {
        if vector.len() != self.dim {
            return Err(Error::Operation(format!(
                "vector dimension {} does not match index dimension {}",
                vector.len(),
                self.dim
            )));
        }
        let id = chunk.id();
        if !self.ids.insert(id.clone()) {
            return Ok(false);
        }
        self.records.push(VectorRecord { id, chunk, vector });
        Ok(true)
    }

    /// Top `min(k, len)` records by cosine similarity, best first.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchHit>, Error> {
        if query.len() != self.dim {
            return Err(Error::Operation(format!(
                "query dimension {} does not match index dimension {}",
                query.len(),
                self.dim
            )));
        }
        if k == 0 || self.records.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(usize, f32)> = self
            .records
            .iter()
            .enumerate()
            .map(|(i, r)| (i, cosine(query, &r.vector)))
            .collect();
        // stable: equal scores stay in insertion order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored
            .into_iter()
            .take(k)
            .map(|(i, score)| {
                let r = &self.records[i];
                SearchHit { id: r.id.clone(), score, chunk: r.chunk.clone() }
            })
            .collect())
    }

    /// Embed `question` as a query and search.
    pub fn query(&self, embedder: &dyn Embedder, question: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.ensure_same_space(embedder)?;
        let q = embedder.embed_query(question)?;
        Ok(self.search(&q, k)?)
    }
}

pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0f32;
    let mut na = 0f32;
    let mut nb = 0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
