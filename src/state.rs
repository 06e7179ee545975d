//! Shared application state for the generation proxy.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. It is
//! built once at startup and never mutated: the validated model registry and
//! the provider client, both behind `Arc`.

use std::sync::Arc;

use crate::provider::ImageEditor;
use crate::registry::ModelRegistry;

/// Request body ceiling. Inline `data:` images are base64 and routinely pass
/// axum's 2 MB default.
pub const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ModelRegistry>,
    pub editor: Arc<dyn ImageEditor>,
    pub max_body_bytes: usize,
}

impl AppState {
    #[must_use]
    pub fn new(registry: ModelRegistry, editor: Arc<dyn ImageEditor>) -> Self {
        Self { registry: Arc::new(registry), editor, max_body_bytes: DEFAULT_MAX_BODY_BYTES }
    }

    #[must_use]
    pub fn with_body_limit(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================
