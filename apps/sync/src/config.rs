//! Sync configuration loaded from environment variables
//!
//! Shared database and catalog settings come from `imprint-shared-config`;
//! the variables below tune import paging, caching and classification.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use imprint_catalog_client::MAX_PAGE_SIZE;
use imprint_shared_config::{parse_env, CatalogConfig, CommonConfig, ConfigError};

use crate::classify::ClassificationConfig;
use crate::error::{SyncError, SyncResult};
use crate::jobs::DEFAULT_BATCH_SIZE;
use crate::sync::{ImportOptions, LabelAliasTable};

/// Sync engine configuration
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Catalog search page size (1..=50)
    pub page_size: u32,

    /// Pause between search pages in milliseconds
    pub page_delay_ms: u64,

    /// Maximum search pages per label name
    pub max_pages: u32,

    /// Label cache TTL in seconds
    pub label_cache_ttl_secs: u64,

    /// Taxonomy TOML file; built-in taxonomies when unset
    pub taxonomy_config: Option<PathBuf>,

    /// Label alias TOML file; no aliases when unset
    pub label_aliases: Option<PathBuf>,

    /// Tracks classified per `classify` run
    pub classify_batch_size: usize,
}

fn optional_path(name: &str) -> Option<PathBuf> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

impl SyncConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> SyncResult<Self> {
        let config = Self {
            common: CommonConfig::from_env()?,
            page_size: parse_env("SYNC_PAGE_SIZE", MAX_PAGE_SIZE)?,
            page_delay_ms: parse_env("SYNC_PAGE_DELAY_MS", 500)?,
            max_pages: parse_env("SYNC_MAX_PAGES", 20)?,
            label_cache_ttl_secs: parse_env("SYNC_LABEL_CACHE_TTL", 300)?,
            taxonomy_config: optional_path("SYNC_TAXONOMY_CONFIG"),
            label_aliases: optional_path("SYNC_LABEL_ALIASES"),
            classify_batch_size: parse_env("SYNC_CLASSIFY_BATCH", DEFAULT_BATCH_SIZE)?,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> SyncResult<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue(
                "SYNC_PAGE_SIZE".to_string(),
                format!("must be between 1 and {}", MAX_PAGE_SIZE),
            )
            .into());
        }
        if self.max_pages == 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_MAX_PAGES".to_string(),
                "must be at least 1".to_string(),
            )
            .into());
        }
        if self.classify_batch_size == 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_CLASSIFY_BATCH".to_string(),
                "must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }

    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            page_size: self.page_size,
            page_delay: Duration::from_millis(self.page_delay_ms),
            max_pages: self.max_pages,
        }
    }

    pub fn label_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.label_cache_ttl_secs)
    }

    /// Catalog settings, required for imports
    pub fn catalog(&self) -> SyncResult<&CatalogConfig> {
        self.common.catalog.as_ref().ok_or_else(|| {
            SyncError::Configuration(
                "CATALOG_API_TOKEN must be set to import from the catalog".to_string(),
            )
        })
    }

    /// Taxonomy configuration from file, or the built-in set
    pub fn classification(&self) -> SyncResult<ClassificationConfig> {
        match &self.taxonomy_config {
            Some(path) => ClassificationConfig::load(path),
            None => Ok(ClassificationConfig::builtin()),
        }
    }

    pub fn aliases(&self) -> SyncResult<LabelAliasTable> {
        match &self.label_aliases {
            Some(path) => LabelAliasTable::load(path),
            None => Ok(LabelAliasTable::new()),
        }
    }

    /// Get database URL
    pub fn database_url(&self) -> &str {
        &self.common.database.url
    }
}
