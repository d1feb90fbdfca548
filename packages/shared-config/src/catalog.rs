//! External catalog service configuration types

use crate::{get_env_or_default, get_required_env, parse_env, ConfigError, ConfigResult};
use std::env;

/// Default catalog API base URL
const DEFAULT_CATALOG_URL: &str = "https://api.spotify.com";

/// External music-catalog service configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Catalog API base URL (without the version prefix)
    pub base_url: String,

    /// Bearer token used for every request
    pub api_token: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Retry attempts for transient failures
    pub max_retries: u32,
}

impl CatalogConfig {
    /// Load catalog configuration from environment variables
    ///
    /// Returns an error if the token is not set, so consumers can call `.ok()`
    /// to get `Option<CatalogConfig>`.
    pub fn from_env() -> ConfigResult<Self> {
        let api_token = get_required_env("CATALOG_API_TOKEN")?;
        let base_url = get_env_or_default("CATALOG_API_URL", DEFAULT_CATALOG_URL);

        if api_token.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "CATALOG_API_TOKEN".to_string(),
                "token cannot be empty".to_string(),
            ));
        }

        url::Url::parse(&base_url)
            .map_err(|e| ConfigError::InvalidUrl("CATALOG_API_URL".to_string(), e.to_string()))?;

        Ok(Self {
            base_url,
            api_token,
            timeout_secs: parse_env("CATALOG_TIMEOUT", 10)?,
            max_retries: parse_env("CATALOG_MAX_RETRIES", 3)?,
        })
    }

    /// Check if the catalog token is present in the environment
    pub fn is_configured() -> bool {
        env::var("CATALOG_API_TOKEN").is_ok()
    }

    /// Create a configuration with custom URL and token (useful for testing)
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: api_token.into(),
            timeout_secs: 10,
            max_retries: 3,
        }
    }

    /// Get the full URL for an API endpoint
    pub fn api_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/v1/{}", base, path)
    }
}
