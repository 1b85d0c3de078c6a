//! Gemini embeddings over `batchEmbedContents`.

use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docqa_core::config::{self, EmbeddingSettings};
use docqa_core::traits::Embedder;

use crate::http::{build_client, check_status, model_endpoint, ProviderError, API_KEY_HEADER};

const TASK_DOCUMENT: &str = "RETRIEVAL_DOCUMENT";
const TASK_QUERY: &str = "RETRIEVAL_QUERY";

pub struct GeminiEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    dim: usize,
    id: String,
}

impl GeminiEmbedder {
    pub fn new(settings: &EmbeddingSettings, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        let model = settings.model.strip_prefix("models/").unwrap_or(&settings.model).to_string();
        Ok(Self {
            client: build_client(settings.timeout_secs)?,
            endpoint: model_endpoint(&settings.base_url, &model, "batchEmbedContents"),
            id: format!("gemini:{model}"),
            model,
            api_key: api_key.into(),
            dim: settings.dimension,
        })
    }

    /// Reads the key from `GOOGLE_API_KEY`; a missing key is fatal here.
    pub fn from_env(settings: &EmbeddingSettings) -> Result<Self> {
        let key = config::api_key()?;
        Ok(Self::new(settings, key)?)
    }

    fn call(&self, texts: &[String], task_type: &'static str) -> Result<Vec<Vec<f32>>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model_ref = format!("models/{}", self.model);
        let body = BatchEmbedRequest {
            requests: texts
                .iter()
                .map(|t| EmbedRequest {
                    model: &model_ref,
                    content: Content { parts: vec![Part { text: t }] },
                    task_type,
                })
                .collect(),
        };
        debug!(count = texts.len(), task_type, "requesting embeddings");
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()?;
        let parsed: BatchEmbedResponse = check_status(response)?
            .json()
            .map_err(|e| ProviderError::Malformed(format!("failed to parse embedding response: {e}")))?;

        if parsed.embeddings.len() != texts.len() {
            return Err(ProviderError::Malformed(format!(
                "expected {} embeddings, got {}",
                texts.len(),
                parsed.embeddings.len()
            )));
        }
        let vectors: Vec<Vec<f32>> = parsed.embeddings.into_iter().map(|e| e.values).collect();
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(ProviderError::Malformed(format!(
                "expected dimension {}, got {}",
                self.dim,
                bad.len()
            )));
        }
        Ok(vectors)
    }
}

impl Embedder for GeminiEmbedder {
    fn embedder_id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self.call(texts, TASK_DOCUMENT)?)
    }

    fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.call(&[text.to_string()], TASK_QUERY)?
            .pop()
            .ok_or_else(|| anyhow::anyhow!("empty embedding response"))
    }
}

#[derive(Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<EmbeddingValues>,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_and_endpoint_from_settings() {
        let settings = EmbeddingSettings { model: "models/text-embedding-004".into(), ..EmbeddingSettings::default() };
        let e = GeminiEmbedder::new(&settings, "k").unwrap();
        assert_eq!(e.embedder_id(), "gemini:text-embedding-004");
        assert!(e.endpoint.ends_with("/models/text-embedding-004:batchEmbedContents"));
        assert_eq!(e.dim(), 768);
    }

    #[test]
    fn request_body_shape() {
        let body = BatchEmbedRequest {
            requests: vec![EmbedRequest {
                model: "models/m",
                content: Content { parts: vec![Part { text: "hi" }] },
                task_type: TASK_QUERY,
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["requests"][0]["taskType"], "RETRIEVAL_QUERY");
        assert_eq!(json["requests"][0]["content"]["parts"][0]["text"], "hi");
        assert_eq!(json["requests"][0]["model"], "models/m");
    }
}
