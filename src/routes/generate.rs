//! Generation proxy route — validate, resolve model, call provider.
//!
//! DESIGN
//! ======
//! Validation runs to completion before the provider is touched, so a 400
//! never costs a provider call. Provider failures are logged here with full
//! detail and returned to the client as an opaque 500. The caller's `falKey`
//! is forwarded to the provider and never logged. Every accepted request is
//! a fresh provider call; nothing is cached or deduplicated.

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::api::{ErrorBody, GenerateImageBody, GenerateImageResponse};
use crate::provider::{EditRequest, ProviderError};
use crate::registry::{ModelRegistry, ModelSpec};
use crate::state::AppState;

const PROVIDER_FAILURE_MESSAGE: &str = "image generation failed";

// =============================================================================
// ERROR
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("request body too large")]
    TooLarge,
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Provider(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the client.
    fn public_message(&self) -> String {
        match self {
            Self::Validation(msg) => msg.clone(),
            Self::TooLarge => self.to_string(),
            Self::Provider(_) => PROVIDER_FAILURE_MESSAGE.to_owned(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody { error: self.public_message() })).into_response()
    }
}

// =============================================================================
// VALIDATION
// =============================================================================

/// A request that passed validation, with the model already resolved.
#[derive(Debug)]
pub(crate) struct ValidatedRequest<'a> {
    pub credential: &'a str,
    pub prompt: &'a str,
    pub image_url: &'a str,
    pub model: &'a ModelSpec,
}

fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str, ApiError> {
    value
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::Validation(format!("{field} is required")))
}

fn is_supported_image_ref(image_url: &str) -> bool {
    image_url.starts_with("https://") || image_url.starts_with("http://") || image_url.starts_with("data:image/")
}

pub(crate) fn validate<'a>(
    body: &'a GenerateImageBody,
    registry: &'a ModelRegistry,
) -> Result<ValidatedRequest<'a>, ApiError> {
    let credential = required(body.fal_key.as_ref(), "falKey")?;
    let prompt = required(body.prompt.as_ref(), "prompt")?;
    let image_url = required(body.image_url.as_ref(), "imageUrl")?;
    let model_name = required(body.model.as_ref(), "model")?;

    if !is_supported_image_ref(image_url) {
        return Err(ApiError::Validation("imageUrl must be an http(s) URL or a data:image URI".into()));
    }

    let model = registry
        .resolve(model_name)
        .ok_or_else(|| ApiError::Validation("unknown model".into()))?;

    Ok(ValidatedRequest { credential, prompt, image_url, model })
}

/// Registry defaults first; the request's prompt and image always win.
pub(crate) fn build_input(model: &ModelSpec, prompt: &str, image_url: &str) -> Map<String, Value> {
    let mut input = model.defaults.to_params();
    input.insert("prompt".into(), Value::String(prompt.to_owned()));
    input.insert("image_url".into(), Value::String(image_url.to_owned()));
    input
}

// =============================================================================
// HANDLER
// =============================================================================

/// `POST /api/generate-image`: edit an image through the provider.
pub async fn generate_image(
    State(state): State<AppState>,
    body: Result<Json<GenerateImageBody>, JsonRejection>,
) -> Result<Json<GenerateImageResponse>, ApiError> {
    let Json(body) = body.map_err(|rejection| {
        debug!(error = %rejection, "rejected generate-image body");
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::TooLarge
        } else {
            ApiError::Validation("invalid JSON body".into())
        }
    })?;

    let validated = validate(&body, &state.registry).inspect_err(|e| {
        debug!(reason = %e, "generate-image validation failed");
    })?;

    let request = EditRequest {
        endpoint: validated.model.endpoint.clone(),
        credential: validated.credential.to_owned(),
        input: build_input(validated.model, validated.prompt, validated.image_url),
    };

    let output = state.editor.edit(&request).await.map_err(|e| {
        log_provider_failure(&validated.model.name, &request.endpoint, &e);
        ApiError::Provider(e)
    })?;

    info!(
        model = %validated.model.name,
        request_id = output.request_id.as_deref().unwrap_or("-"),
        "image generated"
    );

    Ok(Json(GenerateImageResponse { image_url: output.image_url, model: validated.model.name.clone() }))
}

fn log_provider_failure(model: &str, endpoint: &str, err: &ProviderError) {
    match err {
        ProviderError::Status { status, body } => {
            error!(%model, %endpoint, status, provider_body = %body, "provider returned error status");
        }
        other => {
            error!(%model, %endpoint, error = %other, "provider call failed");
        }
    }
}

#[cfg(test)]
#[path = "generate_test.rs"]
mod tests;
