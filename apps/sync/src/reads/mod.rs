//! Read paths with ordered fallbacks

pub mod fallback;
pub mod releases;

pub use fallback::{
    Attempt, AttemptOutcome, DataSource, FallbackOutcome, FallbackQueryReconciler, FetchMeta,
    Fetched, FnStrategy, ReadResult, ReadStrategy,
};
pub use releases::{
    placeholder_listing, release_by_id, releases_by_label, ReleaseListing,
    PLACEHOLDER_ARTWORK_URL, VARIOUS_ARTISTS,
};
