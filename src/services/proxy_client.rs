//! HTTP client for the generation proxy.
//!
//! Mirrors what the browser front end did: one JSON `POST` per edit, the
//! proxy's `{ error }` body surfaced verbatim.

use std::time::Duration;

use serde::Deserialize;

use super::conversation::{GenerationClient, GenerationError};
use crate::api::{ErrorBody, GenerateImageRequest, GenerateImageResponse};
use crate::provider::config::ProviderTimeouts;

pub const DEFAULT_PROXY_URL: &str = "http://127.0.0.1:3000";

/// Entry of `GET /api/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub endpoint: String,
}

pub struct ProxyClient {
    http: reqwest::Client,
    base_url: String,
}

impl ProxyClient {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeouts: ProviderTimeouts) -> Result<Self, GenerationError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeouts.request_secs))
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self { http, base_url: base_url.trim_end_matches('/').to_string() })
    }

    /// `GET /api/models`.
    ///
    /// # Errors
    ///
    /// Returns an error if the proxy is unreachable or answers badly.
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, GenerationError> {
        let response = self
            .http
            .get(format!("{}/api/models", self.base_url))
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        if status != 200 {
            return Err(error_from_body(status, &text));
        }
        serde_json::from_str(&text).map_err(|e| GenerationError::Malformed(e.to_string()))
    }
}

#[async_trait::async_trait]
impl GenerationClient for ProxyClient {
    async fn generate(&self, request: &GenerateImageRequest) -> Result<GenerateImageResponse, GenerationError> {
        let response = self
            .http
            .post(format!("{}/api/generate-image", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        if status != 200 {
            return Err(error_from_body(status, &text));
        }
        parse_generate_response(&text)
    }
}

pub(crate) fn parse_generate_response(text: &str) -> Result<GenerateImageResponse, GenerationError> {
    let parsed: GenerateImageResponse =
        serde_json::from_str(text).map_err(|e| GenerationError::Malformed(e.to_string()))?;
    if parsed.image_url.trim().is_empty() {
        return Err(GenerationError::Malformed("empty imageUrl".into()));
    }
    Ok(parsed)
}

pub(crate) fn error_from_body(status: u16, text: &str) -> GenerationError {
    let message = serde_json::from_str::<ErrorBody>(text)
        .map(|body| body.error)
        .unwrap_or_else(|_| format!("unexpected status {status}"));
    if (400..500).contains(&status) {
        GenerationError::Rejected { status, message }
    } else {
        GenerationError::Failed { status, message }
    }
}

#[cfg(test)]
#[path = "proxy_client_test.rs"]
mod tests;
