//! In-memory catalog service for import tests
//!
//! [`StaticCatalog`] answers searches, release and artist lookups from
//! fixtures and can be told to fail for specific ids.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use imprint_catalog_client::{
    CatalogArtist, CatalogRelease, PageRequest, ReleaseSummary, SearchItem, SearchPage,
    SearchType, TrackAudioFeatures,
};
use imprint_sync::sync::CatalogService;
use imprint_sync::{SyncError, SyncResult};

/// Failure a [`StaticCatalog`] can inject
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Transient upstream error
    Unavailable,
    /// Token rejected
    Unauthorized,
    /// Entity missing upstream
    Missing,
}

impl Failure {
    fn error(&self, what: &str) -> SyncError {
        match self {
            Failure::Unavailable => SyncError::ExternalService {
                message: format!("{} unavailable", what),
                retryable: true,
            },
            Failure::Unauthorized => {
                SyncError::CatalogUnauthorized("catalog rejected the token".to_string())
            }
            Failure::Missing => SyncError::NotFound(format!("catalog entity {}", what)),
        }
    }
}

/// Catalog service backed by fixtures
#[derive(Default)]
pub struct StaticCatalog {
    releases: Mutex<HashMap<String, CatalogRelease>>,
    artists: Mutex<HashMap<String, CatalogArtist>>,
    /// Release ids per search query, in result order
    searches: Mutex<HashMap<String, Vec<String>>>,
    features: Mutex<HashMap<String, TrackAudioFeatures>>,
    failures: Mutex<HashMap<String, Failure>>,
    search_failure: Mutex<Option<Failure>>,
    search_calls: AtomicUsize,
    release_calls: AtomicUsize,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `release` searchable under `label_name` and register its artists
    ///
    /// Artists get a single `deep-house` genre unless added separately first.
    pub fn publish(&self, label_name: &str, release: CatalogRelease) {
        {
            let mut artists = self.artists.lock().unwrap();
            for artist in release.contributing_artists() {
                artists
                    .entry(artist.external_id.clone())
                    .or_insert_with(|| {
                        super::fixtures::catalog_artist(&artist.external_id, &["deep-house"])
                    });
            }
        }
        self.searches
            .lock()
            .unwrap()
            .entry(super::fixtures::label_query(label_name))
            .or_default()
            .push(release.external_id.clone());
        self.releases
            .lock()
            .unwrap()
            .insert(release.external_id.clone(), release);
    }

    pub fn add_artist(&self, artist: CatalogArtist) {
        self.artists
            .lock()
            .unwrap()
            .insert(artist.external_id.clone(), artist);
    }

    pub fn set_features(&self, track_id: &str, features: TrackAudioFeatures) {
        self.features
            .lock()
            .unwrap()
            .insert(track_id.to_string(), features);
    }

    /// Fail lookups of a release or artist id
    pub fn fail(&self, external_id: &str, failure: Failure) {
        self.failures
            .lock()
            .unwrap()
            .insert(external_id.to_string(), failure);
    }

    pub fn fail_search(&self, failure: Failure) {
        *self.search_failure.lock().unwrap() = Some(failure);
    }

    pub fn search_calls(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn release_calls(&self) -> usize {
        self.release_calls.load(Ordering::SeqCst)
    }

    fn check(&self, external_id: &str) -> SyncResult<()> {
        match self.failures.lock().unwrap().get(external_id) {
            Some(failure) => Err(failure.error(external_id)),
            None => Ok(()),
        }
    }
}

fn summary(release: &CatalogRelease) -> ReleaseSummary {
    ReleaseSummary {
        external_id: release.external_id.clone(),
        title: release.title.clone(),
        release_type: release.release_type.clone(),
        release_date: release.release_date.clone(),
        total_tracks: release.total_tracks,
        artists: release.artists.clone(),
    }
}

#[async_trait]
impl CatalogService for StaticCatalog {
    async fn search(
        &self,
        query: &str,
        _types: &[SearchType],
        page: PageRequest,
    ) -> SyncResult<SearchPage> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(failure) = *self.search_failure.lock().unwrap() {
            return Err(failure.error("search"));
        }

        let ids = self
            .searches
            .lock()
            .unwrap()
            .get(query)
            .cloned()
            .unwrap_or_default();
        let releases = self.releases.lock().unwrap();
        let items: Vec<SearchItem> = ids
            .iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .filter_map(|id| releases.get(id))
            .map(|r| SearchItem::Release(summary(r)))
            .collect();

        let total = ids.len() as u32;
        Ok(SearchPage {
            has_more: page.offset + (items.len() as u32) < total,
            items,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn get_release(&self, external_id: &str) -> SyncResult<CatalogRelease> {
        self.release_calls.fetch_add(1, Ordering::SeqCst);
        self.check(external_id)?;
        self.releases
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| Failure::Missing.error(external_id))
    }

    async fn get_artist(&self, external_id: &str) -> SyncResult<CatalogArtist> {
        self.check(external_id)?;
        self.artists
            .lock()
            .unwrap()
            .get(external_id)
            .cloned()
            .ok_or_else(|| Failure::Missing.error(external_id))
    }

    async fn get_audio_features(
        &self,
        track_ids: &[String],
    ) -> SyncResult<HashMap<String, TrackAudioFeatures>> {
        let features = self.features.lock().unwrap();
        Ok(track_ids
            .iter()
            .filter_map(|id| features.get(id).map(|f| (id.clone(), *f)))
            .collect())
    }
}
