//! Model registry — friendly model name → provider endpoint + default params.
//!
//! DESIGN
//! ======
//! The registry is read once at startup from a JSON artifact, validated, and
//! then shared read-only behind an `Arc`. There is no reload path. The
//! built-in table is compiled from `config/models.json`; `MODEL_REGISTRY_PATH`
//! swaps in a file from disk instead.
//!
//! File shape:
//!
//! ```json
//! { "models": { "fast-edit": { "endpoint": "fal-ai/...", "defaults": { "strength": 0.85 } } } }
//! ```

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

const BUILTIN_REGISTRY: &str = include_str!("../../config/models.json");

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to read model registry {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("model registry parse failed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid model registry: {0}")]
    Invalid(String),
}

/// Provider parameter defaults for one model.
///
/// The three tuning knobs are typed and range-checked; anything else in the
/// `defaults` object is passed through to the provider untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelDefaults {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strength: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_inference_steps: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guidance_scale: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ModelDefaults {
    /// Flatten into the provider payload shape.
    #[must_use]
    pub fn to_params(&self) -> Map<String, Value> {
        let mut params = self.extra.clone();
        if let Some(strength) = self.strength {
            params.insert("strength".into(), serde_json::json!(strength));
        }
        if let Some(steps) = self.num_inference_steps {
            params.insert("num_inference_steps".into(), serde_json::json!(steps));
        }
        if let Some(scale) = self.guidance_scale {
            params.insert("guidance_scale".into(), serde_json::json!(scale));
        }
        params
    }

    fn validate(&self, name: &str) -> Result<(), RegistryError> {
        if let Some(strength) = self.strength {
            if !(0.0..=1.0).contains(&strength) {
                return Err(RegistryError::Invalid(format!("{name}: strength {strength} outside 0..=1")));
            }
        }
        if self.num_inference_steps == Some(0) {
            return Err(RegistryError::Invalid(format!("{name}: num_inference_steps must be at least 1")));
        }
        if let Some(scale) = self.guidance_scale {
            if !scale.is_finite() || scale < 0.0 {
                return Err(RegistryError::Invalid(format!("{name}: guidance_scale {scale} must be >= 0")));
            }
        }
        Ok(())
    }
}

/// A resolved registry entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelSpec {
    pub name: String,
    pub endpoint: String,
    pub defaults: ModelDefaults,
}

#[derive(Deserialize)]
struct RegistryFile {
    models: IndexMap<String, RegistryEntry>,
}

#[derive(Deserialize)]
struct RegistryEntry {
    endpoint: String,
    #[serde(default)]
    defaults: ModelDefaults,
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Debug, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, ModelSpec>,
}

impl ModelRegistry {
    /// The registry compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded JSON fails validation.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_json(BUILTIN_REGISTRY)
    }

    /// Load from `path`, or the built-in table when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed, or validated.
    pub fn load(path: Option<&Path>) -> Result<Self, RegistryError> {
        let Some(path) = path else {
            return Self::builtin();
        };
        let raw = std::fs::read_to_string(path)
            .map_err(|source| RegistryError::Io { path: path.display().to_string(), source })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a registry document.
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or any entry is invalid.
    pub fn from_json(raw: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = serde_json::from_str(raw)?;
        if file.models.is_empty() {
            return Err(RegistryError::Invalid("no models defined".into()));
        }

        let mut models = IndexMap::with_capacity(file.models.len());
        for (name, entry) in file.models {
            let name = name.trim().to_owned();
            if name.is_empty() {
                return Err(RegistryError::Invalid("model name must not be empty".into()));
            }
            let endpoint = entry.endpoint.trim().trim_matches('/').to_owned();
            if endpoint.is_empty() {
                return Err(RegistryError::Invalid(format!("{name}: endpoint must not be empty")));
            }
            entry.defaults.validate(&name)?;
            if models.contains_key(&name) {
                return Err(RegistryError::Invalid(format!("{name}: defined twice")));
            }
            models.insert(name.clone(), ModelSpec { name, endpoint, defaults: entry.defaults });
        }

        Ok(Self { models })
    }

    /// Look up a model by its friendly name. `None` means not registered.
    #[must_use]
    pub fn resolve(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    /// All models in file order.
    pub fn list(&self) -> impl Iterator<Item = &ModelSpec> {
        self.models.values()
    }
}

#[cfg(test)]
#[path = "mod_test.rs"]
mod tests;
