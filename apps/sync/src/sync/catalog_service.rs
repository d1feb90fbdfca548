//! Catalog service seam
//!
//! The importer depends on [`CatalogService`] rather than the HTTP client so
//! runs can be driven from fixtures.

use std::collections::HashMap;

use async_trait::async_trait;
use imprint_catalog_client::{
    CatalogArtist, CatalogClient, CatalogRelease, PageRequest, SearchPage, SearchType,
    TrackAudioFeatures,
};

use crate::error::SyncResult;

/// External music catalog
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        page: PageRequest,
    ) -> SyncResult<SearchPage>;

    async fn get_release(&self, external_id: &str) -> SyncResult<CatalogRelease>;

    async fn get_artist(&self, external_id: &str) -> SyncResult<CatalogArtist>;

    /// Audio features keyed by track id; catalogs without analysis return none
    async fn get_audio_features(
        &self,
        _track_ids: &[String],
    ) -> SyncResult<HashMap<String, TrackAudioFeatures>> {
        Ok(HashMap::new())
    }
}

#[async_trait]
impl CatalogService for CatalogClient {
    async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        page: PageRequest,
    ) -> SyncResult<SearchPage> {
        Ok(CatalogClient::search(self, query, types, page).await?)
    }

    async fn get_release(&self, external_id: &str) -> SyncResult<CatalogRelease> {
        Ok(CatalogClient::get_release(self, external_id).await?)
    }

    async fn get_artist(&self, external_id: &str) -> SyncResult<CatalogArtist> {
        Ok(CatalogClient::get_artist(self, external_id).await?)
    }

    async fn get_audio_features(
        &self,
        track_ids: &[String],
    ) -> SyncResult<HashMap<String, TrackAudioFeatures>> {
        Ok(CatalogClient::get_audio_features(self, track_ids).await?)
    }
}
