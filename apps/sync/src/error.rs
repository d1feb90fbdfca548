//! Error handling for the Imprint sync engine
//!
//! A single error type covers importing, classification and the fallback
//! read paths. Per-release failures are recorded against the import run and
//! never abort it; only the variants reported by [`SyncError::is_run_fatal`]
//! end a run.

use imprint_catalog_client::CatalogError;
use imprint_shared_config::ConfigError;
use thiserror::Error;

use crate::models::{ImportStage, ImportStatus};

/// Main sync error type
#[derive(Error, Debug)]
pub enum SyncError {
    // ========== Input Errors ==========
    /// Caller supplied an unusable value
    #[error("validation failed: {0}")]
    Validation(String),

    /// Referenced entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    // ========== External Service Errors ==========
    /// Catalog service call failed after the client's own retries
    #[error("catalog service error: {message}")]
    ExternalService { message: String, retryable: bool },

    /// Catalog credentials missing or rejected
    #[error("catalog service unauthorized: {0}")]
    CatalogUnauthorized(String),

    // ========== Persistence Errors ==========
    /// A write was rejected (missing parent row, constraint violation)
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Database query failed
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    // ========== Import Errors ==========
    /// One release failed; the run carries on with the next one
    #[error("release {external_id} failed during {stage}: {message}")]
    PartialImport {
        external_id: String,
        stage: ImportStage,
        message: String,
    },

    /// Import run status moved in a direction the lifecycle forbids
    #[error("import run cannot move from {from} to {to}")]
    InvalidTransition { from: ImportStatus, to: ImportStatus },

    // ========== Read Path Errors ==========
    /// Every read strategy failed
    #[error("all {attempts} read strategies failed for {entity}")]
    SourceExhausted { entity: String, attempts: usize },

    // ========== Configuration Errors ==========
    /// Configuration error
    #[error("configuration error: {0}")]
    Configuration(String),

    // ========== Internal Errors ==========
    /// Internal error (catch-all for unexpected errors)
    #[error("internal sync error: {0}")]
    Internal(String),
}

impl SyncError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Database(_) | Self::SourceExhausted { .. } => true,
            Self::ExternalService { retryable, .. } => *retryable,
            _ => false,
        }
    }

    /// Whether this error ends an import run instead of a single release
    pub fn is_run_fatal(&self) -> bool {
        matches!(
            self,
            Self::CatalogUnauthorized(_) | Self::Configuration(_) | Self::Internal(_)
        )
    }

    /// Get a severity level for logging
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // Critical errors that should alert operators
            Self::Configuration(_) | Self::CatalogUnauthorized(_) => ErrorSeverity::Critical,

            // Errors that indicate service issues
            Self::Database(_)
            | Self::Persistence(_)
            | Self::ExternalService { .. }
            | Self::InvalidTransition { .. }
            | Self::Internal(_) => ErrorSeverity::Error,

            // Warnings for expected failures
            Self::PartialImport { .. } | Self::SourceExhausted { .. } => ErrorSeverity::Warning,

            // Info level for normal processing issues
            _ => ErrorSeverity::Info,
        }
    }

    /// Get the engine area this error is related to, if applicable
    pub fn context(&self) -> Option<&'static str> {
        match self {
            Self::ExternalService { .. }
            | Self::CatalogUnauthorized(_)
            | Self::PartialImport { .. }
            | Self::InvalidTransition { .. } => Some("catalog_import"),
            Self::SourceExhausted { .. } => Some("fallback_read"),
            Self::Persistence(_) => Some("entity_resolver"),
            _ => None,
        }
    }

    /// Log the error with appropriate severity
    pub fn log(&self) {
        let context = self.context().unwrap_or("general");
        match self.severity() {
            ErrorSeverity::Critical => {
                tracing::error!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Critical sync error"
                );
            }
            ErrorSeverity::Error => {
                tracing::error!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Sync error"
                );
            }
            ErrorSeverity::Warning => {
                tracing::warn!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Sync warning"
                );
            }
            ErrorSeverity::Info => {
                tracing::info!(
                    error = %self,
                    context = context,
                    retryable = self.is_retryable(),
                    "Sync info"
                );
            }
        }
    }

    /// Create a per-release import error
    pub fn partial_import(
        external_id: impl Into<String>,
        stage: ImportStage,
        message: impl Into<String>,
    ) -> Self {
        Self::PartialImport {
            external_id: external_id.into(),
            stage,
            message: message.into(),
        }
    }

    /// Turn a raw database failure into a persistence error naming the row
    pub fn into_persistence(self, what: impl std::fmt::Display) -> Self {
        match self {
            Self::Database(e) => Self::Persistence(format!("{}: {}", what, e)),
            other => other,
        }
    }
}

/// Error severity levels for logging and alerting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// Critical errors that should trigger alerts
    Critical,
    /// Standard errors
    Error,
    /// Warnings for expected failures
    Warning,
    /// Informational messages
    Info,
}

/// Result type alias for sync operations
pub type SyncResult<T> = Result<T, SyncError>;

// ========== Conversion Implementations ==========

impl From<CatalogError> for SyncError {
    fn from(err: CatalogError) -> Self {
        if err.is_credential_failure() {
            return Self::CatalogUnauthorized(err.to_string());
        }
        match err {
            CatalogError::NotFound(path) => Self::NotFound(format!("catalog entity {}", path)),
            CatalogError::InvalidInput(message) => Self::Validation(message),
            other => Self::ExternalService {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

impl From<ConfigError> for SyncError {
    fn from(err: ConfigError) -> Self {
        Self::Configuration(err.to_string())
    }
}

impl From<toml::de::Error> for SyncError {
    fn from(err: toml::de::Error) -> Self {
        Self::Configuration(format!("invalid TOML: {}", err))
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("serialization failed: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(SyncError::Database(sqlx::Error::PoolClosed).is_retryable());
        assert!(SyncError::ExternalService {
            message: "503".to_string(),
            retryable: true
        }
        .is_retryable());

        assert!(!SyncError::Validation("empty id".to_string()).is_retryable());
        assert!(!SyncError::CatalogUnauthorized("bad token".to_string()).is_retryable());
        assert!(!SyncError::Persistence("fk".to_string()).is_retryable());
    }

    #[test]
    fn test_run_fatal() {
        assert!(SyncError::CatalogUnauthorized("bad token".to_string()).is_run_fatal());
        assert!(SyncError::Configuration("no token".to_string()).is_run_fatal());
        assert!(!SyncError::NotFound("catalog entity albums/x".to_string()).is_run_fatal());
        assert!(!SyncError::ExternalService {
            message: "timeout".to_string(),
            retryable: true
        }
        .is_run_fatal());
    }

    #[test]
    fn test_severity_levels() {
        assert_eq!(
            SyncError::Configuration("test".to_string()).severity(),
            ErrorSeverity::Critical
        );
        assert_eq!(
            SyncError::Database(sqlx::Error::PoolClosed).severity(),
            ErrorSeverity::Error
        );
        assert_eq!(
            SyncError::partial_import("rel1", ImportStage::FetchRelease, "timeout").severity(),
            ErrorSeverity::Warning
        );
        assert_eq!(
            SyncError::Validation("x".to_string()).severity(),
            ErrorSeverity::Info
        );
    }

    #[test]
    fn test_catalog_error_conversion() {
        assert!(matches!(
            SyncError::from(CatalogError::Unauthorized),
            SyncError::CatalogUnauthorized(_)
        ));
        assert!(matches!(
            SyncError::from(CatalogError::NotFound("albums/x".to_string())),
            SyncError::NotFound(_)
        ));
        assert!(matches!(
            SyncError::from(CatalogError::RateLimited),
            SyncError::ExternalService { retryable: true, .. }
        ));
    }

    #[test]
    fn test_into_persistence_wraps_database_errors_only() {
        let err = SyncError::Database(sqlx::Error::RowNotFound).into_persistence("track t1");
        assert!(matches!(err, SyncError::Persistence(ref m) if m.starts_with("track t1")));

        let err = SyncError::Validation("x".to_string()).into_persistence("track t1");
        assert!(matches!(err, SyncError::Validation(_)));
    }

    #[test]
    fn test_error_display() {
        let err = SyncError::partial_import("rel9", ImportStage::ResolveTrack, "release missing");
        assert_eq!(
            err.to_string(),
            "release rel9 failed during resolve_track: release missing"
        );

        let err = SyncError::SourceExhausted {
            entity: "release".to_string(),
            attempts: 2,
        };
        assert_eq!(err.to_string(), "all 2 read strategies failed for release");
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_partial_import_logs_as_warning() {
        SyncError::partial_import("rel9", ImportStage::ResolveTrack, "missing release row").log();

        assert!(logs_contain("Sync warning"));
        assert!(logs_contain("rel9"));
    }
}
