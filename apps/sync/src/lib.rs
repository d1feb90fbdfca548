//! Imprint catalog sync engine
//!
//! Keeps a record label's catalog in step with an external music catalog and
//! sorts imported tracks into the label's taxonomies.
//!
//! - [`sync`]: per-label import runs with idempotent entity resolution
//! - [`classify`]: rule-based taxonomy classification
//! - [`reads`]: release reads with ordered fallbacks
//! - [`store`]: Postgres and in-memory persistence

pub mod classify;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod reads;
pub mod store;
pub mod sync;

pub use classify::{Classification, ClassificationConfig, ClassificationEngine, TrackMetadata};
pub use config::SyncConfig;
pub use error::{ErrorSeverity, SyncError, SyncResult};
pub use reads::{DataSource, FallbackOutcome, FallbackQueryReconciler, Fetched};
pub use store::{CatalogStore, LabelStore, MemoryLabelStore, MemoryStore, StoreTransaction};
pub use sync::{
    CatalogImporter, CatalogService, EntityResolver, ImportOptions, LabelAliasTable, LabelCache,
    LabelMatcher,
};
