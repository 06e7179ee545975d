//! Provider — adapter for the external image-editing API.
//!
//! DESIGN
//! ======
//! The proxy route talks to the provider only through the [`ImageEditor`]
//! trait so tests can swap in a mock. `FalClient` is the production
//! implementation: one synchronous HTTP call per edit, no retries, no
//! queueing.
//!
//! The caller's credential travels inside [`EditRequest`] and is never part
//! of a `Debug` rendering or an error message.

pub mod config;
pub mod fal;

use std::fmt;

use serde_json::{Map, Value};

// =============================================================================
// ERROR
// =============================================================================

/// Errors produced by provider calls. Display strings are safe to log.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The underlying HTTP client could not be constructed.
    #[error("HTTP client build failed: {0}")]
    HttpClientBuild(String),

    /// The HTTP request to the provider failed (connect, timeout, body read).
    #[error("provider request failed: {0}")]
    Request(String),

    /// The provider returned a non-success HTTP status.
    #[error("provider response error: status {status}")]
    Status { status: u16, body: String },

    /// The provider response body was not valid JSON.
    #[error("provider response parse failed: {0}")]
    Parse(String),

    /// The provider answered with success but no usable image URL.
    #[error("provider response contained no image URL")]
    MissingImage,
}

// =============================================================================
// REQUEST / RESPONSE
// =============================================================================

/// One edit call: resolved endpoint, caller credential, merged input payload.
#[derive(Clone)]
pub struct EditRequest {
    pub endpoint: String,
    pub credential: String,
    pub input: Map<String, Value>,
}

impl fmt::Debug for EditRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditRequest")
            .field("endpoint", &self.endpoint)
            .field("credential", &"<redacted>")
            .field("input", &self.input.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditOutput {
    pub image_url: String,
    /// Provider-side request id, when the provider reports one.
    pub request_id: Option<String>,
}

// =============================================================================
// IMAGE EDITOR TRAIT
// =============================================================================

/// Provider-neutral async trait for image edits. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ImageEditor: Send + Sync {
    /// Run one edit on the provider.
    ///
    /// # Errors
    ///
    /// Returns a [`ProviderError`] if the request fails, the provider returns
    /// an error status, or the response carries no image.
    async fn edit(&self, request: &EditRequest) -> Result<EditOutput, ProviderError>;
}
