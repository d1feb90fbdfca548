//! Catalog synchronization: label matching, entity resolution and import runs

pub mod catalog_service;
pub mod entity_resolver;
pub mod importer;
pub mod label_cache;
pub mod label_matcher;

pub use catalog_service::CatalogService;
pub use entity_resolver::{EntityResolver, Resolved};
pub use importer::{
    CatalogImporter, ImportOptions, LabelImportOutcome, LabelImportReport,
};
pub use label_cache::{LabelCache, DEFAULT_LABEL_TTL};
pub use label_matcher::{matches, normalize_label, LabelAliasTable, LabelMatch, LabelMatcher};
