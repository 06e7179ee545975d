//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! The proxy exposes one working endpoint, `POST /api/generate-image`, plus
//! a read-only model listing and a health probe. CORS is open so a browser
//! front end on another origin can call it.

pub mod generate;

use axum::Router;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::Json;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::registry::ModelSpec;
use crate::state::AppState;

/// Build the proxy router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.max_body_bytes);

    Router::new()
        .route("/api/generate-image", post(generate::generate_image).layer(body_limit))
        .route("/api/models", get(list_models))
        .route("/healthz", get(healthz))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// `GET /api/models`: registered models in registry order.
async fn list_models(State(state): State<AppState>) -> Json<Vec<ModelSpec>> {
    Json(state.registry.list().cloned().collect())
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
