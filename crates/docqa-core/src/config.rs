//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge built-in defaults + `config.toml` + `config.<env>.toml`
//! + `APP_*` env vars (nested keys separated by `__`, e.g.
//! `APP_INDEXING__BATCH_SIZE=5`). Provides helpers to expand `~` and `${VAR}`
//! and to resolve relative paths against a known base directory.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

/// Environment variable holding the provider credential.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

pub struct Config {
    figment: Figment,
    settings: Settings,
    base_dir: PathBuf,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::load_in(Path::new("."))
    }

    /// Load with config files looked up in `base_dir`; relative data paths
    /// are resolved against it as well.
    pub fn load_in(base_dir: &Path) -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(base_dir.join("config.toml")));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file(base_dir.join("config.dev.toml"))),
            "prod" | "production" => figment = figment.merge(Toml::file(base_dir.join("config.prod.toml"))),
            "test" | "testing" => figment = figment.merge(Toml::file(base_dir.join("config.test.toml"))),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        let settings: Settings = figment
            .extract()
            .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))?;
        settings.validate_for_env(&env_name)?;
        Ok(Self { figment, settings, base_dir: base_dir.to_path_buf() })
    }

    pub fn get<T>(&self, key: &str) -> anyhow::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        self.figment
            .extract_inner(key)
            .map_err(|e| anyhow::anyhow!("Failed to get '{}': {}", key, e))
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn documents_dir(&self) -> PathBuf {
        resolve_with_base(&self.base_dir, &self.settings.data.documents_dir)
    }

    pub fn vectorstore_dir(&self) -> PathBuf {
        resolve_with_base(&self.base_dir, &self.settings.data.vectorstore_dir)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data: DataSettings,
    pub chunking: ChunkingSettings,
    pub indexing: IndexingSettings,
    pub retrieval: RetrievalSettings,
    pub embedding: EmbeddingSettings,
    pub generation: GenerationSettings,
    pub ocr: OcrSettings,
    pub logging: LoggingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Uploaded files are copied here before extraction.
    pub documents_dir: String,
    /// The single location holding the persisted vector index.
    pub vectorstore_dir: String,
    pub table: String,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            documents_dir: "data/documents".to_string(),
            vectorstore_dir: "data/vectorstore/db_lance".to_string(),
            table: "chunks".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self { chunk_size: 1000, chunk_overlap: 200 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexingSettings {
    pub batch_size: usize,
    pub pacing_ms: u64,
    pub show_progress: bool,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self { batch_size: 10, pacing_ms: 1500, show_progress: true }
    }
}

impl IndexingSettings {
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    pub default_k: usize,
    pub max_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self { default_k: 3, max_k: 10 }
    }
}

impl RetrievalSettings {
    /// Clamp a user-supplied `k` into `1..=max_k`.
    pub fn bound_k(&self, k: usize) -> usize {
        k.clamp(1, self.max_k.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProviderKind {
    Gemini,
    Fake,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: EmbeddingProviderKind,
    pub model: String,
    pub base_url: String,
    pub dimension: usize,
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: EmbeddingProviderKind::Gemini,
            model: "text-embedding-004".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            dimension: 768,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub model: String,
    pub base_url: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    pub command: String,
    pub lang: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self { command: "tesseract".to_string(), lang: "eng".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self { level: "info".to_string() }
    }
}

impl Settings {
    pub fn validate_for_env(&self, env: &str) -> anyhow::Result<()> {
        if self.chunking.chunk_size == 0 {
            return Err(Error::InvalidConfig("chunking.chunk_size must be > 0".into()).into());
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunking.chunk_overlap ({}) must be smaller than chunking.chunk_size ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            ))
            .into());
        }
        if self.indexing.batch_size == 0 {
            return Err(Error::InvalidConfig("indexing.batch_size must be > 0".into()).into());
        }
        if self.retrieval.max_k == 0 || self.retrieval.default_k == 0 || self.retrieval.default_k > self.retrieval.max_k {
            return Err(Error::InvalidConfig(format!(
                "retrieval.default_k ({}) must be within 1..={}",
                self.retrieval.default_k, self.retrieval.max_k
            ))
            .into());
        }
        let production = matches!(env, "prod" | "production");
        if production && self.embedding.provider == EmbeddingProviderKind::Fake {
            return Err(Error::InvalidConfig("fake embeddings are not allowed in production".into()).into());
        }
        Ok(())
    }
}

/// Read the provider credential from the process environment.
///
/// A missing or blank value is a configuration error; callers construct
/// their clients at startup so this surfaces before any request is served.
pub fn api_key() -> Result<String, Error> {
    match env::var(API_KEY_ENV) {
        Ok(key) if !key.trim().is_empty() => Ok(key),
        _ => Err(Error::MissingCredential(API_KEY_ENV)),
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bound_k_clamps_into_range() {
        let r = RetrievalSettings::default();
        assert_eq!(r.bound_k(0), 1);
        assert_eq!(r.bound_k(4), 4);
        assert_eq!(r.bound_k(50), 10);
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let mut s = Settings::default();
        s.chunking.chunk_overlap = s.chunking.chunk_size;
        assert!(s.validate_for_env("dev").is_err());
    }

    #[test]
    fn fake_embeddings_rejected_in_prod() {
        let mut s = Settings::default();
        s.embedding.provider = EmbeddingProviderKind::Fake;
        assert!(s.validate_for_env("dev").is_ok());
        assert!(s.validate_for_env("prod").is_err());
    }

    #[test]
    fn resolve_keeps_absolute_paths() {
        let base = Path::new("/srv/app");
        assert_eq!(resolve_with_base(base, "data/x"), PathBuf::from("/srv/app/data/x"));
        assert_eq!(resolve_with_base(base, "/var/x"), PathBuf::from("/var/x"));
    }
}
