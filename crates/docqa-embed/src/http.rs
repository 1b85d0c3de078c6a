//! Blocking HTTP plumbing shared by the Gemini clients.

use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;
use thiserror::Error;

pub const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("authentication rejected ({status}): {body}")]
    Unauthorized { status: u16, body: String },

    #[error("rate limited by provider: {0}")]
    RateLimited(String),

    #[error("provider server error ({status}): {body}")]
    Server { status: u16, body: String },

    #[error("request rejected ({status}): {body}")]
    BadRequest { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("malformed response: {0}")]
    Malformed(String),
}

pub fn build_client(timeout_secs: u64) -> Result<Client, ProviderError> {
    Ok(Client::builder().timeout(Duration::from_secs(timeout_secs)).build()?)
}

/// Pass successful responses through, map everything else by status class.
pub fn check_status(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_else(|_| "unable to read response body".to_string());
    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Unauthorized { status: status.as_u16(), body },
        StatusCode::TOO_MANY_REQUESTS => ProviderError::RateLimited(body),
        s if s.is_server_error() => ProviderError::Server { status: s.as_u16(), body },
        s => ProviderError::BadRequest { status: s.as_u16(), body },
    })
}

/// `base_url` without trailing slash joined with `models/<model>:<method>`.
pub fn model_endpoint(base_url: &str, model: &str, method: &str) -> String {
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!("{}/models/{}:{}", base_url.trim_end_matches('/'), model, method)
}
