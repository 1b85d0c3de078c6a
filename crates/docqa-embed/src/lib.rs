use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use docqa_core::config::{EmbeddingProviderKind, EmbeddingSettings};
use docqa_core::traits::Embedder;

pub mod fake;
pub mod gemini;
pub mod http;

pub use fake::FakeEmbedder;
pub use gemini::GeminiEmbedder;
pub use http::ProviderError;

pub const FAKE_ENV: &str = "APP_USE_FAKE_EMBEDDINGS";

fn fake_forced() -> bool {
    std::env::var(FAKE_ENV)
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Provider selected by settings, with `APP_USE_FAKE_EMBEDDINGS=1` forcing the
/// fake one. Construction fails when the remote provider has no API key.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    if fake_forced() || settings.provider == EmbeddingProviderKind::Fake {
        info!(dim = settings.dimension, "using fake embedder");
        return Ok(Arc::new(FakeEmbedder::new(settings.dimension)));
    }
    let embedder = GeminiEmbedder::from_env(settings)?;
    info!(model = %settings.model, "using gemini embeddings");
    Ok(Arc::new(embedder))
}
