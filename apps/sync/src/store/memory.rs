//! In-memory stores
//!
//! [`MemoryStore`] enforces the same constraints as the Postgres schema
//! (unique external ids, tracks need their release and artists) so engine
//! tests exercise real rollback behaviour. Transactions are serialized: a
//! transaction holds the table lock from `begin` until commit or rollback
//! and works on a staged copy.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use uuid::Uuid;

use super::{CatalogStore, LabelStore, StoreTransaction};
use crate::error::{SyncError, SyncResult};
use crate::models::{
    Artist, EntityKind, EntityRecord, ImportRun, Label, Release, Track, TrackClassification,
    UntaggedTrack,
};

#[derive(Debug, Default, Clone)]
struct Tables {
    artists: HashMap<Uuid, Artist>,
    releases: HashMap<Uuid, Release>,
    tracks: HashMap<Uuid, Track>,
    release_artists: BTreeSet<(Uuid, Uuid)>,
    track_artists: BTreeSet<(Uuid, Uuid)>,
    /// Track insertion order, for oldest-first listing
    track_order: Vec<Uuid>,
}

impl Tables {
    fn find_id(&self, kind: EntityKind, external_id: &str) -> Option<Uuid> {
        match kind {
            EntityKind::Artist => self
                .artists
                .values()
                .find(|a| a.external_id == external_id)
                .map(|a| a.id),
            EntityKind::Release => self
                .releases
                .values()
                .find(|r| r.external_id == external_id)
                .map(|r| r.id),
            EntityKind::Track => self
                .tracks
                .values()
                .find(|t| t.external_id == external_id)
                .map(|t| t.id),
        }
    }

    fn exists(&self, kind: EntityKind, id: Uuid) -> bool {
        match kind {
            EntityKind::Artist => self.artists.contains_key(&id),
            EntityKind::Release => self.releases.contains_key(&id),
            EntityKind::Track => self.tracks.contains_key(&id),
        }
    }

    fn require(&self, kind: EntityKind, id: Uuid, referenced_by: &str) -> SyncResult<()> {
        if self.exists(kind, id) {
            Ok(())
        } else {
            Err(SyncError::Persistence(format!(
                "{} references missing {} {}",
                referenced_by, kind, id
            )))
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    commits: AtomicUsize,
    rollbacks: AtomicUsize,
}

/// In-memory catalog store with write-failure injection
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
    runs: Arc<RwLock<Vec<ImportRun>>>,
    faults: Arc<RwLock<HashSet<String>>>,
    counters: Arc<Counters>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every write of an entity with this external id fail
    pub async fn fail_on_external_id(&self, external_id: impl Into<String>) {
        self.faults.write().await.insert(external_id.into());
    }

    pub async fn clear_faults(&self) {
        self.faults.write().await.clear();
    }

    pub async fn artist_count(&self) -> usize {
        self.tables.lock().await.artists.len()
    }

    pub async fn release_count(&self) -> usize {
        self.tables.lock().await.releases.len()
    }

    pub async fn track_count(&self) -> usize {
        self.tables.lock().await.tracks.len()
    }

    pub async fn artist_by_external_id(&self, external_id: &str) -> Option<Artist> {
        let tables = self.tables.lock().await;
        tables
            .artists
            .values()
            .find(|a| a.external_id == external_id)
            .cloned()
    }

    pub async fn release_by_external_id(&self, external_id: &str) -> Option<Release> {
        let tables = self.tables.lock().await;
        tables
            .releases
            .values()
            .find(|r| r.external_id == external_id)
            .cloned()
    }

    pub async fn track_by_external_id(&self, external_id: &str) -> Option<Track> {
        let tables = self.tables.lock().await;
        tables
            .tracks
            .values()
            .find(|t| t.external_id == external_id)
            .cloned()
    }

    /// Artist ids linked to a release or track
    pub async fn linked_artists(&self, kind: EntityKind, id: Uuid) -> Vec<Uuid> {
        let tables = self.tables.lock().await;
        let links = match kind {
            EntityKind::Release => &tables.release_artists,
            EntityKind::Track => &tables.track_artists,
            EntityKind::Artist => return Vec::new(),
        };
        links
            .iter()
            .filter(|(owner, _)| *owner == id)
            .map(|(_, artist)| *artist)
            .collect()
    }

    pub async fn import_run(&self, id: Uuid) -> Option<ImportRun> {
        self.runs.read().await.iter().find(|r| r.id == id).cloned()
    }

    pub async fn import_runs(&self) -> Vec<ImportRun> {
        self.runs.read().await.clone()
    }

    pub fn commit_count(&self) -> usize {
        self.counters.commits.load(Ordering::SeqCst)
    }

    pub fn rollback_count(&self) -> usize {
        self.counters.rollbacks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn begin(&self) -> SyncResult<Box<dyn StoreTransaction>> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = guard.clone();
        let faults = self.faults.read().await.clone();
        Ok(Box::new(MemoryTransaction {
            guard,
            staged,
            faults,
            counters: self.counters.clone(),
        }))
    }

    async fn create_import_run(&self, run: &ImportRun) -> SyncResult<()> {
        let mut runs = self.runs.write().await;
        if runs.iter().any(|r| r.id == run.id) {
            return Err(SyncError::Persistence(format!(
                "import run {} already exists",
                run.id
            )));
        }
        runs.push(run.clone());
        Ok(())
    }

    async fn update_import_run(&self, run: &ImportRun) -> SyncResult<()> {
        let mut runs = self.runs.write().await;
        let stored = runs
            .iter_mut()
            .find(|r| r.id == run.id)
            .ok_or_else(|| SyncError::NotFound(format!("import run {}", run.id)))?;
        *stored = run.clone();
        Ok(())
    }

    async fn untagged_tracks(&self, limit: usize) -> SyncResult<Vec<UntaggedTrack>> {
        let tables = self.tables.lock().await;
        let untagged = tables
            .track_order
            .iter()
            .filter_map(|id| tables.tracks.get(id))
            .filter(|t| t.classification.is_none())
            .take(limit)
            .map(|track| {
                let genres: BTreeSet<String> = tables
                    .track_artists
                    .iter()
                    .filter(|(owner, _)| *owner == track.id)
                    .filter_map(|(_, artist_id)| tables.artists.get(artist_id))
                    .flat_map(|a| a.genres.iter().cloned())
                    .collect();
                UntaggedTrack {
                    id: track.id,
                    external_id: track.external_id.clone(),
                    title: track.title.clone(),
                    explicit: track.explicit,
                    genres: genres.into_iter().collect(),
                    audio_features: track.audio_features,
                }
            })
            .collect();
        Ok(untagged)
    }

    async fn assign_classification(
        &self,
        track_id: Uuid,
        taxonomy: &str,
        confidence: f64,
    ) -> SyncResult<()> {
        let mut tables = self.tables.lock().await;
        let track = tables
            .tracks
            .get_mut(&track_id)
            .ok_or_else(|| SyncError::NotFound(format!("track {}", track_id)))?;
        track.classification = Some(TrackClassification {
            taxonomy: taxonomy.to_string(),
            confidence,
        });
        Ok(())
    }
}

struct MemoryTransaction {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
    faults: HashSet<String>,
    counters: Arc<Counters>,
}

impl MemoryTransaction {
    fn check_fault(&self, record: &EntityRecord) -> SyncResult<()> {
        if self.faults.contains(record.external_id()) {
            return Err(SyncError::Persistence(format!(
                "injected write failure for {} {}",
                record.kind(),
                record.external_id()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_id(&mut self, kind: EntityKind, external_id: &str) -> SyncResult<Option<Uuid>> {
        Ok(self.staged.find_id(kind, external_id))
    }

    async fn exists(&mut self, kind: EntityKind, id: Uuid) -> SyncResult<bool> {
        Ok(self.staged.exists(kind, id))
    }

    async fn insert(&mut self, id: Uuid, record: &EntityRecord) -> SyncResult<()> {
        self.check_fault(record)?;
        if self
            .staged
            .find_id(record.kind(), record.external_id())
            .is_some()
        {
            return Err(SyncError::Persistence(format!(
                "duplicate {} external id {}",
                record.kind(),
                record.external_id()
            )));
        }

        let tables = &mut self.staged;
        match record {
            EntityRecord::Artist(a) => {
                tables.artists.insert(id, Artist::from_record(id, a));
            }
            EntityRecord::Release(r) => {
                tables.releases.insert(id, Release::from_record(id, r));
            }
            EntityRecord::Track(t) => {
                tables.require(EntityKind::Release, t.release_id, &t.external_id)?;
                tables.tracks.insert(id, Track::from_record(id, t));
                tables.track_order.push(id);
            }
        }
        Ok(())
    }

    async fn update(&mut self, id: Uuid, record: &EntityRecord) -> SyncResult<()> {
        self.check_fault(record)?;
        let tables = &mut self.staged;
        let missing = || SyncError::NotFound(format!("{} {}", record.kind(), id));
        match record {
            EntityRecord::Artist(a) => tables.artists.get_mut(&id).ok_or_else(missing)?.apply(a),
            EntityRecord::Release(r) => tables.releases.get_mut(&id).ok_or_else(missing)?.apply(r),
            EntityRecord::Track(t) => tables.tracks.get_mut(&id).ok_or_else(missing)?.apply(t),
        }
        Ok(())
    }

    async fn link_artists(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        artist_ids: &[Uuid],
    ) -> SyncResult<()> {
        let tables = &mut self.staged;
        tables.require(kind, id, "artist link")?;
        for artist_id in artist_ids {
            tables.require(EntityKind::Artist, *artist_id, &id.to_string())?;
        }
        let links = match kind {
            EntityKind::Release => &mut tables.release_artists,
            EntityKind::Track => &mut tables.track_artists,
            EntityKind::Artist => {
                return Err(SyncError::Validation(
                    "artists cannot be linked to artists".to_string(),
                ))
            }
        };
        links.extend(artist_ids.iter().map(|artist_id| (id, *artist_id)));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> SyncResult<()> {
        let MemoryTransaction {
            mut guard,
            staged,
            counters,
            ..
        } = *self;
        *guard = staged;
        counters.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> SyncResult<()> {
        self.counters.rollbacks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// In-memory label store
///
/// Counts lookups so cache behaviour can be asserted, and can be switched
/// to fail every call to simulate an unreachable backing store.
#[derive(Clone, Default)]
pub struct MemoryLabelStore {
    labels: Arc<RwLock<Vec<Label>>>,
    unavailable: Arc<AtomicBool>,
    lookups: Arc<AtomicUsize>,
}

impl MemoryLabelStore {
    pub fn with_labels(labels: Vec<Label>) -> Self {
        Self {
            labels: Arc::new(RwLock::new(labels)),
            ..Self::default()
        }
    }

    /// Insert or replace a label by id
    pub async fn upsert(&self, label: Label) {
        let mut labels = self.labels.write().await;
        match labels.iter_mut().find(|l| l.id == label.id) {
            Some(existing) => *existing = label,
            None => labels.push(label),
        }
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Calls that reached this store
    pub fn lookup_count(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    fn check_available(&self) -> SyncResult<()> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SyncError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl LabelStore for MemoryLabelStore {
    async fn get_label(&self, id: Uuid) -> SyncResult<Option<Label>> {
        self.check_available()?;
        Ok(self.labels.read().await.iter().find(|l| l.id == id).cloned())
    }

    async fn list_labels(&self) -> SyncResult<Vec<Label>> {
        self.check_available()?;
        Ok(self.labels.read().await.clone())
    }
}
