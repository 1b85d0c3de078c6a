//! Session context plus the two user workflows: ingest documents, ask questions.
//!
//! Both workflows report back through [`Status`] values instead of errors; the
//! caller decides how to render them.
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use docqa_core::config::{Config, RetrievalSettings};
use docqa_core::data_processor::{is_supported, list_supported_files, source_name, DataProcessor};
use docqa_core::ocr::TesseractOcr;
use docqa_core::types::{Chunk, SearchHit};
use docqa_embed::get_default_embedder;
use docqa_vector::{IndexBuilder, IndexStore, Retriever, VectorIndex};

use crate::composer::AnswerComposer;
use crate::llm::GeminiChat;

pub const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Warning(String),
    Error(String),
    Info(String),
    Success(String),
}

impl Status {
    pub fn message(&self) -> &str {
        match self {
            Self::Warning(m) | Self::Error(m) | Self::Info(m) | Self::Success(m) => m,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Warning(_) => "warning",
            Self::Error(_) => "error",
            Self::Info(_) => "info",
            Self::Success(_) => "success",
        };
        write!(f, "{label}: {}", self.message())
    }
}

#[derive(Debug, Default)]
pub struct IngestReport {
    /// Paths inside the documents directory that were handed to extraction.
    pub staged: Vec<PathBuf>,
    pub rejected: Vec<PathBuf>,
    pub chunks: usize,
    pub statuses: Vec<Status>,
}

impl IngestReport {
    pub fn succeeded(&self) -> bool {
        self.statuses.iter().any(|s| matches!(s, Status::Success(_)))
    }
}

#[derive(Debug, Default)]
pub struct AskOutcome {
    pub hits: Vec<SearchHit>,
    /// `None` when the question was not attempted (no index).
    pub answer: Option<String>,
    pub statuses: Vec<Status>,
}

pub struct Session {
    documents_dir: PathBuf,
    processor: DataProcessor,
    builder: IndexBuilder,
    retriever: Retriever,
    composer: AnswerComposer,
    retrieval: RetrievalSettings,
    index: Option<VectorIndex>,
}

impl Session {
    pub fn new(
        documents_dir: PathBuf,
        processor: DataProcessor,
        builder: IndexBuilder,
        retriever: Retriever,
        composer: AnswerComposer,
        retrieval: RetrievalSettings,
    ) -> Self {
        Self { documents_dir, processor, builder, retriever, composer, retrieval, index: None }
    }

    /// Wire every component from configuration and load the persisted index.
    /// Fails when a required credential is missing.
    pub fn from_config(config: &Config) -> Result<Self> {
        let settings = config.settings();
        let embedder = get_default_embedder(&settings.embedding)?;
        let model = GeminiChat::from_env(&settings.generation)?;
        let store = IndexStore::open(&config.vectorstore_dir(), &settings.data.table)?;
        let processor = DataProcessor::new(&settings.chunking, Box::new(TesseractOcr::from_settings(&settings.ocr)));
        let mut session = Self::new(
            config.documents_dir(),
            processor,
            IndexBuilder::new(embedder.clone(), store, &settings.indexing),
            Retriever::new(embedder),
            AnswerComposer::new(Box::new(model)),
            settings.retrieval.clone(),
        );
        session.load_persisted()?;
        Ok(session)
    }

    /// Replace the session index with what is on disk. Returns whether one was found.
    pub fn load_persisted(&mut self) -> Result<bool> {
        self.index = self.builder.store().load_for(self.builder.embedder().as_ref())?;
        if let Some(index) = &self.index {
            info!(records = index.len(), "persisted index loaded");
        }
        Ok(self.index.is_some())
    }

    pub fn index(&self) -> Option<&VectorIndex> {
        self.index.as_ref()
    }

    pub fn documents_dir(&self) -> &Path {
        &self.documents_dir
    }

    /// Stage uploads, extract, and grow the index. On indexing failure the
    /// previous index stays in place.
    pub fn ingest(&mut self, uploads: &[PathBuf]) -> IngestReport {
        let mut report = IngestReport::default();
        if uploads.is_empty() {
            report.statuses.push(Status::Warning("Please select files first.".to_string()));
            return report;
        }

        let (staged, rejected) = match stage_uploads(uploads, &self.documents_dir) {
            Ok(split) => split,
            Err(e) => {
                report.statuses.push(Status::Error(format!("An error occurred during ingestion: {e:#}")));
                return report;
            }
        };
        for path in &rejected {
            report.statuses.push(Status::Warning(format!("Skipped unsupported or missing file: {}", source_name(path))));
        }
        report.staged = staged;
        report.rejected = rejected;

        let chunks = self.processor.process_paths(&report.staged);
        report.chunks = chunks.len();
        if chunks.is_empty() {
            report.statuses.push(Status::Error("Could not extract readable text from the files.".to_string()));
            return report;
        }
        report.statuses.push(Status::Info(format!("{} chunks generated, indexing...", chunks.len())));

        match self.builder.build_or_extend(self.index.clone(), &chunks) {
            Ok(index) => {
                self.index = index;
                report.statuses.push(Status::Success("Index updated and ready.".to_string()));
            }
            Err(e) => {
                warn!(processed = e.processed, "ingestion aborted: {:#}", e.source);
                report.statuses.push(Status::Error(format!("An error occurred during ingestion: {e}")));
            }
        }
        report
    }

    /// Retrieve once, show the hits, answer from them. `k` defaults to the
    /// configured value and is clamped to `1..=max_k`.
    pub fn ask(&self, question: &str, k: Option<usize>) -> AskOutcome {
        let mut outcome = AskOutcome::default();
        let index = match self.index.as_ref() {
            Some(index) if !index.is_empty() => index,
            _ => {
                outcome.statuses.push(Status::Warning(
                    "The index is empty. Ingest documents to get started.".to_string(),
                ));
                return outcome;
            }
        };

        let k = self.retrieval.bound_k(k.unwrap_or(self.retrieval.default_k));
        outcome.hits = self.retriever.similarity_query(Some(index), question, k);
        if outcome.hits.is_empty() {
            outcome.statuses.push(Status::Warning("No relevant context found.".to_string()));
        } else {
            outcome.statuses.push(Status::Info(format!("Found {} relevant passages.", outcome.hits.len())));
        }

        let context: Vec<Chunk> = outcome.hits.iter().map(|h| h.chunk.clone()).collect();
        outcome.answer = Some(self.composer.answer(question, &context));
        outcome
    }
}

/// Copy supported uploads into `documents_dir`; directories are walked.
/// Returns `(staged, rejected)`; staged paths point inside `documents_dir`.
/// Uploads sharing a file name land in one slot, last one wins.
pub fn stage_uploads(uploads: &[PathBuf], documents_dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
    fs::create_dir_all(documents_dir)
        .with_context(|| format!("creating documents directory {}", documents_dir.display()))?;
    let mut staged: Vec<PathBuf> = Vec::new();
    let mut rejected = Vec::new();
    for upload in uploads {
        let candidates = if upload.is_dir() { list_supported_files(upload) } else { vec![upload.clone()] };
        for path in candidates {
            if !is_supported(&path) || !path.is_file() {
                warn!("rejecting upload {}", path.display());
                rejected.push(path);
                continue;
            }
            let dest = documents_dir.join(source_name(&path));
            let already_staged = staged.contains(&dest);
            if already_staged {
                warn!("{} overwrites an earlier upload with the same name", path.display());
            }
            if !same_file(&path, &dest) {
                fs::copy(&path, &dest).with_context(|| format!("copying {} to {}", path.display(), dest.display()))?;
            }
            if !already_staged {
                staged.push(dest);
            }
        }
    }
    Ok((staged, rejected))
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

/// First [`PREVIEW_CHARS`] characters followed by `...`.
pub fn preview(text: &str) -> String {
    let head: String = text.chars().take(PREVIEW_CHARS).collect();
    format!("{head}...")
}

/// `[i] Source: <name>` then the preview, `i` starting at 1.
pub fn format_passage(position: usize, hit: &SearchHit) -> String {
    format!("[{}] Source: {}\n{}", position, hit.chunk.source(), preview(&hit.chunk.text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::Document;

    #[test]
    fn preview_counts_characters() {
        let text: String = "é".repeat(250);
        let p = preview(&text);
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert!(p.ends_with("..."));
        assert_eq!(preview("short"), "short...");
    }

    #[test]
    fn passage_format() {
        let hit = SearchHit {
            id: "x".into(),
            score: 0.9,
            chunk: Chunk::new("Boil water for 10 minutes.", Document::new("", "manual.pdf").metadata),
        };
        assert_eq!(format_passage(1, &hit), "[1] Source: manual.pdf\nBoil water for 10 minutes....");
    }

    #[test]
    fn status_display() {
        assert_eq!(Status::Warning("w".into()).to_string(), "warning: w");
        assert!(Status::Error("e".into()).is_error());
    }
}
