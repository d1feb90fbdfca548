//! Idempotent upsert of catalog entities keyed by external id

use tracing::debug;
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};
use crate::models::{EntityKind, EntityRecord};
use crate::store::StoreTransaction;

/// Row resolved by [`EntityResolver::upsert`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub id: Uuid,
    /// True when a new row was inserted, false when an existing one was updated
    pub created: bool,
}

/// Resolves catalog records to internal rows
///
/// The external id is the only idempotency key: an unknown id inserts a row
/// with a fresh UUID, a known one updates display fields and keeps the
/// internal id and existing relationships. All writes go through the
/// caller's transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntityResolver;

impl EntityResolver {
    pub fn new() -> Self {
        Self
    }

    pub async fn upsert(
        &self,
        tx: &mut dyn StoreTransaction,
        record: &EntityRecord,
    ) -> SyncResult<Resolved> {
        let kind = record.kind();
        let external_id = record.external_id();
        if external_id.trim().is_empty() {
            return Err(SyncError::Validation(format!(
                "{} external id cannot be empty",
                kind
            )));
        }
        let what = format!("{} {}", kind, external_id);

        self.check_references(tx, record, &what).await?;

        let existing = tx
            .find_id(kind, external_id)
            .await
            .map_err(|e| e.into_persistence(&what))?;

        let resolved = match existing {
            Some(id) => {
                tx.update(id, record)
                    .await
                    .map_err(|e| e.into_persistence(&what))?;
                Resolved { id, created: false }
            }
            None => {
                let id = Uuid::new_v4();
                tx.insert(id, record)
                    .await
                    .map_err(|e| e.into_persistence(&what))?;
                Resolved { id, created: true }
            }
        };

        if !record.artist_ids().is_empty() {
            tx.link_artists(kind, resolved.id, record.artist_ids())
                .await
                .map_err(|e| e.into_persistence(&what))?;
        }

        debug!(
            kind = %kind,
            external_id = %external_id,
            id = %resolved.id,
            created = resolved.created,
            "Resolved entity"
        );

        Ok(resolved)
    }

    /// Parents must already exist in this transaction
    async fn check_references(
        &self,
        tx: &mut dyn StoreTransaction,
        record: &EntityRecord,
        what: &str,
    ) -> SyncResult<()> {
        if let EntityRecord::Track(track) = record {
            let present = tx
                .exists(EntityKind::Release, track.release_id)
                .await
                .map_err(|e| e.into_persistence(what))?;
            if !present {
                return Err(SyncError::Persistence(format!(
                    "{} references missing release {}",
                    what, track.release_id
                )));
            }
        }

        for artist_id in record.artist_ids() {
            let present = tx
                .exists(EntityKind::Artist, *artist_id)
                .await
                .map_err(|e| e.into_persistence(what))?;
            if !present {
                return Err(SyncError::Persistence(format!(
                    "{} references missing artist {}",
                    what, artist_id
                )));
            }
        }
        Ok(())
    }
}
