//! Provider configuration parsed from environment variables.

pub const DEFAULT_FAL_API_BASE: &str = "https://fal.run";
pub const DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderTimeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for ProviderTimeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    pub api_base: String,
    pub timeouts: ProviderTimeouts,
}

impl ProviderConfig {
    /// Build from a key lookup. All keys are optional:
    /// - `FAL_API_BASE`: default `https://fal.run`
    /// - `PROVIDER_REQUEST_TIMEOUT_SECS`: default 120
    /// - `PROVIDER_CONNECT_TIMEOUT_SECS`: default 10
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_base = lookup("FAL_API_BASE")
            .map(|v| v.trim().trim_end_matches('/').to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_FAL_API_BASE.to_string());
        let timeouts = ProviderTimeouts {
            request_secs: parse_u64(lookup("PROVIDER_REQUEST_TIMEOUT_SECS"), DEFAULT_PROVIDER_REQUEST_TIMEOUT_SECS),
            connect_secs: parse_u64(lookup("PROVIDER_CONNECT_TIMEOUT_SECS"), DEFAULT_PROVIDER_CONNECT_TIMEOUT_SECS),
        };
        Self { api_base, timeouts }
    }
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
