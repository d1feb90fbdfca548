//! Domain models for the sync engine
//!
//! Labels are read-only here. Artists, releases and tracks are written via
//! the entity resolver, keyed by the catalog's external id.

mod entity;
mod import_run;
mod label;

pub use entity::{
    Artist, ArtistRecord, AudioFeatures, EntityKind, EntityRecord, Release, ReleaseRecord, Track,
    TrackClassification, TrackRecord, UntaggedTrack,
};
pub use import_run::{ImportRun, ImportStage, ImportStatus, ImportSummary, ItemError};
pub use label::Label;
