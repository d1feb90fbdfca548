//! Persistence seams for the sync engine
//!
//! The engine only talks to these traits. [`postgres`] is the production
//! implementation; [`memory`] backs tests and dry runs.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncResult;
use crate::models::{EntityKind, EntityRecord, ImportRun, Label, UntaggedTrack};

pub use memory::{MemoryLabelStore, MemoryStore};
pub use postgres::{PgCatalogStore, PgLabelStore};

/// Read access to record labels
#[async_trait]
pub trait LabelStore: Send + Sync {
    async fn get_label(&self, id: Uuid) -> SyncResult<Option<Label>>;

    async fn list_labels(&self) -> SyncResult<Vec<Label>>;
}

/// Catalog tables and import-run bookkeeping
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Open a write scope; nothing written through it is visible until commit
    async fn begin(&self) -> SyncResult<Box<dyn StoreTransaction>>;

    async fn create_import_run(&self, run: &ImportRun) -> SyncResult<()>;

    /// Persist status, timestamps, message and item errors
    async fn update_import_run(&self, run: &ImportRun) -> SyncResult<()>;

    /// Tracks without a classification, oldest first
    async fn untagged_tracks(&self, limit: usize) -> SyncResult<Vec<UntaggedTrack>>;

    async fn assign_classification(
        &self,
        track_id: Uuid,
        taxonomy: &str,
        confidence: f64,
    ) -> SyncResult<()>;
}

/// Writes scoped to one unit of work
#[async_trait]
pub trait StoreTransaction: Send {
    /// Internal id of the row with this external id, if any
    async fn find_id(&mut self, kind: EntityKind, external_id: &str) -> SyncResult<Option<Uuid>>;

    /// Whether a row with this internal id is visible in the transaction
    async fn exists(&mut self, kind: EntityKind, id: Uuid) -> SyncResult<bool>;

    async fn insert(&mut self, id: Uuid, record: &EntityRecord) -> SyncResult<()>;

    /// Update mutable display fields only
    async fn update(&mut self, id: Uuid, record: &EntityRecord) -> SyncResult<()>;

    /// Add artist links to a release or track; existing links are kept
    async fn link_artists(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        artist_ids: &[Uuid],
    ) -> SyncResult<()>;

    async fn commit(self: Box<Self>) -> SyncResult<()>;

    async fn rollback(self: Box<Self>) -> SyncResult<()>;
}
