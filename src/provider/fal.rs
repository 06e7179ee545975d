//! fal.ai synchronous-run client.
//!
//! `POST {api_base}/{endpoint}` with `Authorization: Key <credential>` and
//! the merged input as the JSON body. The run endpoint blocks until the
//! edit is done and answers with `{ "images": [{ "url": ... }], ... }`.

use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde_json::Value;

use super::config::ProviderConfig;
use super::{EditOutput, EditRequest, ImageEditor, ProviderError};

const MAX_ERROR_BODY_CHARS: usize = 512;

pub struct FalClient {
    http: reqwest::Client,
    api_base: String,
}

impl FalClient {
    /// Build a client from typed provider config.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeouts.request_secs))
            .connect_timeout(Duration::from_secs(config.timeouts.connect_secs))
            .build()
            .map_err(|e| ProviderError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, api_base: config.api_base.trim_end_matches('/').to_string() })
    }

    fn endpoint_url(&self, endpoint: &str) -> String {
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            return endpoint.to_string();
        }
        format!("{}/{}", self.api_base, endpoint.trim_start_matches('/'))
    }
}

#[async_trait::async_trait]
impl ImageEditor for FalClient {
    async fn edit(&self, request: &EditRequest) -> Result<EditOutput, ProviderError> {
        let url = self.endpoint_url(&request.endpoint);
        let response = self
            .http
            .post(url)
            .header(AUTHORIZATION, format!("Key {}", request.credential))
            .json(&request.input)
            .send()
            .await
            .map_err(|e| ProviderError::Request(e.without_url().to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ProviderError::Request(e.without_url().to_string()))?;
        if !status.is_success() {
            return Err(ProviderError::Status { status: status.as_u16(), body: truncate(&text, MAX_ERROR_BODY_CHARS) });
        }
        parse_edit_response(&text)
    }
}

// =============================================================================
// RESPONSE PARSING
// =============================================================================

/// Pull the first image URL out of a run response.
///
/// Accepts `images[0].url`, `images[0]` as a bare string, or `image.url`.
pub(crate) fn parse_edit_response(text: &str) -> Result<EditOutput, ProviderError> {
    let body: Value = serde_json::from_str(text).map_err(|e| ProviderError::Parse(e.to_string()))?;
    let image_url = first_image_url(&body).ok_or(ProviderError::MissingImage)?;
    let request_id = body
        .get("request_id")
        .and_then(Value::as_str)
        .map(str::to_string);
    Ok(EditOutput { image_url, request_id })
}

fn first_image_url(body: &Value) -> Option<String> {
    let from_images = body
        .get("images")
        .and_then(Value::as_array)
        .and_then(|images| images.first())
        .and_then(image_url_of);
    from_images
        .or_else(|| body.get("image").and_then(image_url_of))
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .map(str::to_string)
}

fn image_url_of(value: &Value) -> Option<&str> {
    match value {
        Value::String(url) => Some(url),
        Value::Object(obj) => obj.get("url").and_then(Value::as_str),
        _ => None,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push('…');
    out
}

#[cfg(test)]
#[path = "fal_test.rs"]
mod tests;
