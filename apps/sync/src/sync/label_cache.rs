//! TTL cache in front of the label store
//!
//! Labels change rarely but every import run starts with a lookup. Entries
//! expire after the configured TTL; admins renaming a label call
//! [`LabelCache::invalidate`] to pick the change up immediately.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::SyncResult;
use crate::models::Label;
use crate::store::LabelStore;

/// Default time a label stays cached
pub const DEFAULT_LABEL_TTL: Duration = Duration::from_secs(300);

/// Cached label entry
#[derive(Debug, Clone)]
struct CachedLabel {
    label: Label,
    /// When this entry was cached
    cached_at: Instant,
}

impl CachedLabel {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.cached_at.elapsed() > ttl
    }
}

/// Label lookups with expiry and explicit invalidation
///
/// Misses are not cached, so a label created after a failed lookup is seen
/// on the next call.
#[derive(Clone)]
pub struct LabelCache {
    store: Arc<dyn LabelStore>,
    ttl: Duration,
    cache: Arc<RwLock<HashMap<Uuid, CachedLabel>>>,
}

impl LabelCache {
    pub fn new(store: Arc<dyn LabelStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            cache: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get cached label if available and not expired
    async fn get_cached(&self, id: Uuid) -> Option<Label> {
        let cache = self.cache.read().await;
        cache
            .get(&id)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.label.clone())
    }

    async fn set_cached(&self, label: Label) {
        let mut cache = self.cache.write().await;
        cache.insert(
            label.id,
            CachedLabel {
                label,
                cached_at: Instant::now(),
            },
        );
    }

    /// Look up a label, going to the store on a miss or expired entry
    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> SyncResult<Option<Label>> {
        if let Some(label) = self.get_cached(id).await {
            debug!(label_id = %id, "Label cache hit");
            return Ok(Some(label));
        }

        let label = self.store.get_label(id).await?;
        if let Some(label) = &label {
            self.set_cached(label.clone()).await;
            debug!(label_id = %id, "Label loaded and cached");
        }
        Ok(label)
    }

    /// List every label from the store and refresh the cache with them
    pub async fn list(&self) -> SyncResult<Vec<Label>> {
        let labels = self.store.list_labels().await?;
        let now = Instant::now();
        let mut cache = self.cache.write().await;
        for label in &labels {
            cache.insert(
                label.id,
                CachedLabel {
                    label: label.clone(),
                    cached_at: now,
                },
            );
        }
        Ok(labels)
    }

    /// Drop one cached label
    pub async fn invalidate(&self, id: Uuid) {
        self.cache.write().await.remove(&id);
        debug!(label_id = %id, "Label cache entry invalidated");
    }

    /// Drop every cached label
    pub async fn invalidate_all(&self) {
        self.cache.write().await.clear();
        debug!("Label cache cleared");
    }

    /// Number of entries currently held, expired ones included
    pub async fn len(&self) -> usize {
        self.cache.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.cache.read().await.is_empty()
    }
}
