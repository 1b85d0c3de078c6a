//! Gemini chat completions over `generateContent`.

use anyhow::Result;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docqa_core::config::{self, GenerationSettings};
use docqa_core::traits::LanguageModel;
use docqa_embed::http::{build_client, check_status, model_endpoint, ProviderError, API_KEY_HEADER};

pub struct GeminiChat {
    client: Client,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl GeminiChat {
    pub fn new(settings: &GenerationSettings, api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Ok(Self {
            client: build_client(settings.timeout_secs)?,
            endpoint: model_endpoint(&settings.base_url, &settings.model, "generateContent"),
            model: settings.model.clone(),
            api_key: api_key.into(),
            temperature: settings.temperature,
        })
    }

    pub fn from_env(settings: &GenerationSettings) -> Result<Self> {
        let key = config::api_key()?;
        Ok(Self::new(settings, key)?)
    }

    fn complete(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = GenerateRequest {
            contents: vec![Content { role: "user", parts: vec![PartOut { text: prompt }] }],
            generation_config: GenerationConfig { temperature: self.temperature },
        };
        debug!(model = %self.model, prompt_chars = prompt.len(), "generateContent");
        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()?;
        let parsed: GenerateResponse = check_status(response)?
            .json()
            .map_err(|e| ProviderError::Malformed(format!("failed to parse generation response: {e}")))?;

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            let reason = parsed
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .unwrap_or_else(|| "no candidates returned".to_string());
            return Err(ProviderError::Malformed(reason));
        };
        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.is_empty() {
            return Err(ProviderError::Malformed(format!(
                "empty candidate (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            )));
        }
        Ok(text)
    }
}

impl LanguageModel for GeminiChat {
    fn model_id(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> Result<String> {
        Ok(self.complete(prompt)?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'static str,
    parts: Vec<PartOut<'a>>,
}

#[derive(Serialize)]
struct PartOut<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartIn>,
}

#[derive(Deserialize)]
struct PartIn {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}
