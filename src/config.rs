//! Server configuration parsed from environment variables.

use std::path::PathBuf;

use crate::provider::config::ProviderConfig;
use crate::state::DEFAULT_MAX_BODY_BYTES;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid PORT: {0}")]
    InvalidPort(String),
    #[error("invalid MAX_BODY_BYTES: {0}")]
    InvalidBodyLimit(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub port: u16,
    /// `None` selects the registry compiled into the binary.
    pub registry_path: Option<PathBuf>,
    pub max_body_bytes: usize,
    pub provider: ProviderConfig,
}

impl ServerConfig {
    /// Build typed server config from the process environment.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `MODEL_REGISTRY_PATH`: JSON registry file; built-in table when unset
    /// - `MAX_BODY_BYTES`: request body ceiling, default 25 MiB
    /// - provider settings, see [`ProviderConfig::from_lookup`]
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` or `MAX_BODY_BYTES` is set but malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns an error if `PORT` or `MAX_BODY_BYTES` is set but malformed.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let port = match lookup("PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort(raw))?,
            None => DEFAULT_PORT,
        };
        let registry_path = lookup("MODEL_REGISTRY_PATH")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        let max_body_bytes = match lookup("MAX_BODY_BYTES") {
            Some(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|v| *v > 0)
                .ok_or(ConfigError::InvalidBodyLimit(raw))?,
            None => DEFAULT_MAX_BODY_BYTES,
        };
        let provider = ProviderConfig::from_lookup(&lookup);
        Ok(Self { port, registry_path, max_body_bytes, provider })
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
