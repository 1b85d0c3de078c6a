//! Recursive character splitter.
//!
//! Tries separators in order of preference and only falls back to the next
//! one for pieces that are still too long. Small pieces are merged back into
//! windows of at most `chunk_size` characters, with up to `chunk_overlap`
//! characters carried over from the previous window. Separators stay attached
//! to the start of the piece that follows them. Lengths are in `char`s.

use std::collections::VecDeque;

use tracing::debug;

use crate::config::ChunkingSettings;
use crate::types::{Chunk, Document};

pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for RecursiveSplitter {
    fn default() -> Self {
        Self::from_settings(&ChunkingSettings::default())
    }
}

impl RecursiveSplitter {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            chunk_overlap,
            separators: DEFAULT_SEPARATORS.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Self {
        Self::new(settings.chunk_size, settings.chunk_overlap)
    }

    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    /// Split every document; each chunk inherits its document's metadata.
    pub fn split_documents(&self, docs: &[Document]) -> Vec<Chunk> {
        docs.iter()
            .flat_map(|doc| {
                self.split_text(&doc.text)
                    .into_iter()
                    .map(move |text| Chunk::new(text, doc.metadata.clone()))
            })
            .collect()
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let mut separator = separators.last().map_or("", String::as_str);
        let mut remaining: &[String] = &[];
        for (i, sep) in separators.iter().enumerate() {
            if sep.is_empty() {
                separator = sep.as_str();
                break;
            }
            if text.contains(sep.as_str()) {
                separator = sep.as_str();
                remaining = &separators[i + 1..];
                break;
            }
        }

        let mut final_chunks = Vec::new();
        let mut good: Vec<&str> = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(piece) < self.chunk_size {
                good.push(piece);
                continue;
            }
            if !good.is_empty() {
                final_chunks.extend(self.merge_splits(&good));
                good.clear();
            }
            if remaining.is_empty() {
                if let Some(piece) = clean(piece) {
                    final_chunks.push(piece);
                }
            } else {
                final_chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !good.is_empty() {
            final_chunks.extend(self.merge_splits(&good));
        }
        final_chunks
    }

    fn merge_splits(&self, splits: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in splits {
            let len = char_len(piece);
            if total + len > self.chunk_size {
                if total > self.chunk_size {
                    debug!(total, chunk_size = self.chunk_size, "created a chunk longer than the target size");
                }
                if !window.is_empty() {
                    if let Some(doc) = join_window(&window) {
                        docs.push(doc);
                    }
                    // Shrink to the overlap, and further if the next piece still would not fit.
                    while total > self.chunk_overlap || (total + len > self.chunk_size && total > 0) {
                        let Some((_, front_len)) = window.pop_front() else { break };
                        total -= front_len;
                    }
                }
            }
            window.push_back((piece, len));
            total += len;
        }
        if let Some(doc) = join_window(&window) {
            docs.push(doc);
        }
        docs
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn clean(s: &str) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() { None } else { Some(trimmed.to_string()) }
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    clean(&joined)
}

/// Split at every occurrence of `separator`, keeping the separator at the
/// start of the following piece. An empty separator splits into characters.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }
    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (idx, _) in text.match_indices(separator) {
        if idx > start {
            pieces.push(&text[start..idx]);
        }
        start = idx;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_whitespace_text(n: usize) -> String {
        "abcdefghij".chars().cycle().take(n).collect()
    }

    #[test]
    fn three_thousand_chars_make_four_overlapping_chunks() {
        let text = no_whitespace_text(3000);
        let chunks = RecursiveSplitter::new(1000, 200).split_text(&text);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![1000, 1000, 1000, 600]);
        assert_eq!(chunks[0], text[0..1000]);
        assert_eq!(chunks[1], text[800..1800]);
        assert_eq!(chunks[2], text[1600..2600]);
        assert_eq!(chunks[3], text[2400..3000]);
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let chunks = RecursiveSplitter::new(1000, 200).split_text("  Short text\n");
        assert_eq!(chunks, vec!["Short text".to_string()]);
    }

    #[test]
    fn paragraphs_are_preferred_split_points() {
        let para_a = "a".repeat(60);
        let para_b = "b".repeat(60);
        let text = format!("{para_a}\n\n{para_b}");
        let chunks = RecursiveSplitter::new(100, 0).split_text(&text);
        assert_eq!(chunks, vec![para_a, para_b]);
    }

    #[test]
    fn separator_is_kept_with_following_piece() {
        let pieces = split_keeping_separator("one. two. three", ". ");
        assert_eq!(pieces, vec!["one", ". two", ". three"]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        assert!(RecursiveSplitter::new(10, 2).split_text(" \n\n \n ").is_empty());
    }

    #[test]
    fn multibyte_text_is_counted_in_chars() {
        let text: String = "é".repeat(25);
        let chunks = RecursiveSplitter::new(10, 0).split_text(&text);
        let lens: Vec<usize> = chunks.iter().map(|c| c.chars().count()).collect();
        assert_eq!(lens, vec![10, 10, 5]);
    }

    #[test]
    fn split_documents_copies_metadata() {
        let doc = Document::new("x".repeat(30), "notes.md");
        let chunks = RecursiveSplitter::new(10, 0).split_documents(&[doc]);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.source() == "notes.md"));
    }
}
