//! OCR through the `tesseract` executable.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use std::process::Command;

use crate::config::OcrSettings;
use crate::traits::OcrEngine;

pub struct TesseractOcr {
    command: String,
    lang: String,
}

impl TesseractOcr {
    pub fn new(command: impl Into<String>, lang: impl Into<String>) -> Self {
        Self { command: command.into(), lang: lang.into() }
    }

    pub fn from_settings(settings: &OcrSettings) -> Self {
        Self::new(settings.command.clone(), settings.lang.clone())
    }
}

impl Default for TesseractOcr {
    fn default() -> Self {
        Self::from_settings(&OcrSettings::default())
    }
}

impl OcrEngine for TesseractOcr {
    fn recognize(&self, image_path: &Path) -> Result<String> {
        let output = Command::new(&self.command)
            .arg(image_path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.lang)
            .output()
            .with_context(|| format!("failed to run '{}'", self.command))?;
        if !output.status.success() {
            return Err(anyhow!(
                "'{}' exited with {}: {}",
                self.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(normalize_lines(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// One detected line per output line; blank lines dropped.
pub fn normalize_lines(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_drops_blank_lines() {
        assert_eq!(normalize_lines("  INVOICE 42 \n\n\n total: 10\n\x0c"), "INVOICE 42\ntotal: 10");
    }

    #[test]
    fn missing_binary_is_an_error() {
        let ocr = TesseractOcr::new("definitely-not-a-real-ocr-binary", "eng");
        assert!(ocr.recognize(Path::new("whatever.png")).is_err());
    }
}
