//! Domain types shared by the extractor, the vector index and the composer.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type ChunkId = String;
pub type Meta = BTreeMap<String, String>;

/// Metadata key naming the originating file.
pub const SOURCE_KEY: &str = "source";
/// Metadata key tagging the kind of content (e.g. `"image"`).
pub const TYPE_KEY: &str = "type";
/// Metadata key holding the zero-based page index of PDF content.
pub const PAGE_KEY: &str = "page";

/// Unknown source label used when a chunk carries no `source` entry.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Text extracted from one input file, before it is split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Meta,
}

impl Document {
    pub fn new(text: impl Into<String>, source: impl Into<String>) -> Self {
        let mut metadata = Meta::new();
        metadata.insert(SOURCE_KEY.to_string(), source.into());
        Self { text: text.into(), metadata }
    }

    #[must_use]
    pub fn with_type(mut self, doc_type: impl Into<String>) -> Self {
        self.metadata.insert(TYPE_KEY.to_string(), doc_type.into());
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// A unit of retrievable text.
///
/// - `text`: non-empty payload
/// - `metadata`: at least `source`; optionally `type`
///
/// Chunks are never mutated once produced by the splitter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    pub metadata: Meta,
}

impl Chunk {
    pub fn new(text: impl Into<String>, metadata: Meta) -> Self {
        Self { text: text.into(), metadata }
    }

    pub fn source(&self) -> &str {
        self.metadata.get(SOURCE_KEY).map_or(UNKNOWN_SOURCE, String::as_str)
    }

    pub fn doc_type(&self) -> Option<&str> {
        self.metadata.get(TYPE_KEY).map(String::as_str)
    }

    /// Stable identity of a chunk: blake3 over source and text.
    ///
    /// Re-ingesting an unchanged file yields the same ids, which is what the
    /// index builder uses to skip duplicates.
    pub fn id(&self) -> ChunkId {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.source().as_bytes());
        hasher.update(&[0u8]);
        hasher.update(self.text.as_bytes());
        hasher.finalize().to_hex().to_string()
    }
}

/// One similarity match. `score` is cosine similarity; higher is better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: ChunkId,
    pub score: f32,
    pub chunk: Chunk,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunk_id_depends_on_source_and_text() {
        let a = Chunk::new("same text", Document::new("", "a.txt").metadata);
        let b = Chunk::new("same text", Document::new("", "b.txt").metadata);
        let a2 = Chunk::new("same text", Document::new("", "a.txt").metadata);
        assert_ne!(a.id(), b.id());
        assert_eq!(a.id(), a2.id());
        assert_eq!(a.id().len(), 64);
    }

    #[test]
    fn missing_source_falls_back_to_unknown() {
        let c = Chunk::new("x", Meta::new());
        assert_eq!(c.source(), UNKNOWN_SOURCE);
        assert_eq!(c.doc_type(), None);
    }
}
