//! Wire types for `POST /api/generate-image`, shared by the proxy route and
//! the client that calls it.

use serde::{Deserialize, Serialize};

/// Request body as the client sends it.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageRequest {
    pub fal_key: String,
    pub prompt: String,
    pub image_url: String,
    pub model: String,
}

/// Request body as the proxy receives it. Every field may be absent so the
/// route can name the missing one instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageBody {
    #[serde(default)]
    pub fal_key: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateImageResponse {
    pub image_url: String,
    pub model: String,
}

/// Body of every 4xx/5xx answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
