//! Content extraction: files in, chunks out.
//!
//! Dispatch is by lower-cased extension. Failures are isolated per file: a
//! file that cannot be read contributes nothing and the rest still run.

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::ChunkingSettings;
use crate::error::Error;
use crate::splitter::RecursiveSplitter;
use crate::traits::OcrEngine;
use crate::types::{Chunk, Document, PAGE_KEY};

pub const SUPPORTED_EXTENSIONS: [&str; 6] = ["pdf", "txt", "md", "png", "jpg", "jpeg"];

/// Metadata `type` tag for OCR'd images.
pub const IMAGE_TYPE: &str = "image";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Pdf,
    Image,
    Text,
    Unsupported,
}

impl FileKind {
    pub fn of(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "pdf" => Self::Pdf,
            "png" | "jpg" | "jpeg" => Self::Image,
            "txt" | "md" => Self::Text,
            _ => Self::Unsupported,
        }
    }
}

pub fn is_supported(path: &Path) -> bool {
    FileKind::of(path) != FileKind::Unsupported
}

pub struct DataProcessor {
    splitter: RecursiveSplitter,
    ocr: Box<dyn OcrEngine>,
}

impl DataProcessor {
    pub fn new(chunking: &ChunkingSettings, ocr: Box<dyn OcrEngine>) -> Self {
        Self { splitter: RecursiveSplitter::from_settings(chunking), ocr }
    }

    /// Extract and split. Returns an empty vector when nothing could be read.
    pub fn process_paths(&self, paths: &[PathBuf]) -> Vec<Chunk> {
        info!(files = paths.len(), "starting extraction");
        let documents = self.extract_documents(paths);
        if documents.is_empty() {
            warn!("no content extracted from any file");
            return Vec::new();
        }
        let chunks = self.splitter.split_documents(&documents);
        info!(documents = documents.len(), chunks = chunks.len(), "extraction completed");
        chunks
    }

    /// Walk `data_dir` and process every supported file under it.
    pub fn process_directory(&self, data_dir: &Path) -> Vec<Chunk> {
        let files = list_supported_files(data_dir);
        if files.is_empty() {
            warn!("no supported files found under {}", data_dir.display());
            return Vec::new();
        }
        self.process_paths(&files)
    }

    pub fn extract_documents(&self, paths: &[PathBuf]) -> Vec<Document> {
        let mut documents = Vec::new();
        for (file_index, path) in paths.iter().enumerate() {
            debug!("processing file {}/{}: {}", file_index + 1, paths.len(), path.display());
            match self.extract_file(path) {
                Ok(docs) => documents.extend(docs),
                Err(e) => warn!("{}", e),
            }
        }
        documents
    }

    /// Documents for a single file. Unsupported extensions yield `Ok(vec![])`.
    pub fn extract_file(&self, path: &Path) -> Result<Vec<Document>, Error> {
        let source = source_name(path);
        match FileKind::of(path) {
            FileKind::Pdf => {
                let pages = read_pdf_pages(path)?;
                debug!(pages = pages.len(), "pdf loaded: {}", source);
                Ok(pages
                    .into_iter()
                    .enumerate()
                    .filter(|(_, text)| !text.trim().is_empty())
                    .map(|(page, text)| Document::new(text, source.as_str()).with_meta(PAGE_KEY, page.to_string()))
                    .collect())
            }
            FileKind::Image => {
                info!("image detected: {} - running OCR", source);
                let text = self.ocr.recognize(path).map_err(|e| extraction_error(path, e))?;
                Ok(non_blank(Document::new(text, source).with_type(IMAGE_TYPE)))
            }
            FileKind::Text => {
                let text = read_file_content(path)?;
                Ok(non_blank(Document::new(text, source)))
            }
            FileKind::Unsupported => {
                warn!("unsupported format, skipping: {}", source);
                Ok(Vec::new())
            }
        }
    }
}

/// File name used as the `source` metadata value.
pub fn source_name(path: &Path) -> String {
    path.file_name()
        .map_or_else(|| path.to_string_lossy().to_string(), |n| n.to_string_lossy().to_string())
}

pub fn list_supported_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry in walkdir::WalkDir::new(root).into_iter().filter_map(Result::ok).filter(|e| e.file_type().is_file()) {
        let path = entry.path();
        if is_supported(path) { files.push(path.to_path_buf()); }
    }
    files.sort();
    files
}

fn non_blank(doc: Document) -> Vec<Document> {
    if doc.text.trim().is_empty() { Vec::new() } else { vec![doc] }
}

fn extraction_error(path: &Path, reason: impl std::fmt::Display) -> Error {
    Error::Extraction { path: path.to_path_buf(), reason: reason.to_string() }
}

fn read_file_content(path: &Path) -> Result<String, Error> {
    let bytes = fs::read(path).map_err(|e| extraction_error(path, e))?;
    match String::from_utf8(bytes) {
        Ok(content) => Ok(content),
        Err(e) => Ok(String::from_utf8_lossy(e.as_bytes()).to_string()),
    }
}

/// Text of each page, in page order. Pages are kept apart so the last word of
/// one page never runs into the first word of the next.
fn read_pdf_pages(path: &Path) -> Result<Vec<String>, Error> {
    let bytes = fs::read(path).map_err(|e| extraction_error(path, e))?;
    // pdf-extract panics on some malformed inputs; keep that contained to this file.
    match panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem_by_pages(&bytes))) {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(extraction_error(path, e)),
        Err(_) => Err(extraction_error(path, "PDF parser panicked")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_kind_is_case_insensitive() {
        assert_eq!(FileKind::of(Path::new("a/B.PDF")), FileKind::Pdf);
        assert_eq!(FileKind::of(Path::new("scan.JpEg")), FileKind::Image);
        assert_eq!(FileKind::of(Path::new("notes.md")), FileKind::Text);
        assert_eq!(FileKind::of(Path::new("report.docx")), FileKind::Unsupported);
        assert_eq!(FileKind::of(Path::new("README")), FileKind::Unsupported);
    }

    #[test]
    fn source_name_is_the_file_name() {
        assert_eq!(source_name(Path::new("/tmp/docs/manual.pdf")), "manual.pdf");
    }
}
