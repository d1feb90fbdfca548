//! Catalog API error types

use thiserror::Error;

/// Catalog API client errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Bearer token is missing
    #[error("API token is required for catalog access")]
    MissingToken,

    /// Invalid input provided to an API method
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("failed to parse catalog response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Catalog returned a non-success status
    #[error("catalog API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Token rejected by the catalog
    #[error("catalog rejected the API token")]
    Unauthorized,

    /// Requested entity does not exist
    #[error("catalog entity not found: {0}")]
    NotFound(String),

    /// Rate limited by the catalog
    #[error("rate limited by catalog API")]
    RateLimited,

    /// Request timeout
    #[error("request to catalog timed out")]
    Timeout,

    /// Response parsed but violates the expected shape (e.g. empty id)
    #[error("malformed catalog entity: {0}")]
    Malformed(String),
}

impl CatalogError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Retries on timeouts, rate limiting, transport errors and 5xx
    /// responses. Client errors are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Timeout | CatalogError::RateLimited => true,
            CatalogError::Api { status, .. } => *status >= 500,
            CatalogError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            _ => false,
        }
    }

    /// Check if this error means the credentials are unusable
    ///
    /// An import cannot make progress on any release once this is true.
    pub fn is_credential_failure(&self) -> bool {
        matches!(self, CatalogError::MissingToken | CatalogError::Unauthorized)
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(CatalogError::Timeout.is_retryable());
        assert!(CatalogError::RateLimited.is_retryable());
        assert!(CatalogError::Api {
            status: 503,
            message: "unavailable".into()
        }
        .is_retryable());
        assert!(!CatalogError::Api {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
        assert!(!CatalogError::Unauthorized.is_retryable());
        assert!(!CatalogError::NotFound("albums/x".into()).is_retryable());
    }

    #[test]
    fn test_credential_failure() {
        assert!(CatalogError::Unauthorized.is_credential_failure());
        assert!(CatalogError::MissingToken.is_credential_failure());
        assert!(!CatalogError::Timeout.is_credential_failure());
    }
}
