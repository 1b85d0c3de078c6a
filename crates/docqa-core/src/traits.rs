use std::path::Path;

use crate::types::Chunk;

pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `gemini:text-embedding-004`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    /// Embed document chunks. One request per call; callers do the batching.
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
    /// Embed a search query. Providers with asymmetric task types override this.
    fn embed_query(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("embedder returned no vector for query"))
    }
}

pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;
    /// Single blocking completion for a fully rendered prompt.
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub trait OcrEngine: Send + Sync {
    /// Recognized text of an image file, lines joined by `\n`. Empty when
    /// nothing was detected.
    fn recognize(&self, image_path: &Path) -> anyhow::Result<String>;
}

/// Something that can supply grounding context for a question.
pub trait ContextSource {
    fn context_for(&self, question: &str) -> Vec<Chunk>;
}
