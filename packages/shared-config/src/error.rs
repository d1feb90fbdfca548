//! Configuration error types

use thiserror::Error;

/// Errors raised while reading service configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Missing required environment variable
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    /// Environment variable present but not parseable
    #[error("invalid value for {0}: {1}")]
    InvalidValue(String, String),

    /// Invalid URL format
    #[error("invalid URL format for {0}: {1}")]
    InvalidUrl(String, String),

    /// Values parse individually but contradict each other
    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// Name of the environment variable at fault, when there is a single one
    pub fn variable(&self) -> Option<&str> {
        match self {
            Self::MissingEnvVar(name) | Self::InvalidValue(name, _) | Self::InvalidUrl(name, _) => {
                Some(name)
            }
            Self::ValidationError(_) => None,
        }
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;
