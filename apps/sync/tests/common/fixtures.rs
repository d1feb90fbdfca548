//! Test fixtures for sync integration tests
//!
//! Catalog entity builders and a ready-wired importer over in-memory stores.

use std::sync::Arc;
use std::time::Duration;

use imprint_catalog_client::{
    ArtistRef, CatalogArtist, CatalogRelease, CatalogTrack, TrackAudioFeatures,
};
use imprint_sync::models::{AudioFeatures, Label};
use imprint_sync::sync::{
    CatalogImporter, ImportOptions, LabelAliasTable, LabelCache, LabelMatcher, DEFAULT_LABEL_TTL,
};
use imprint_sync::{MemoryLabelStore, MemoryStore};

use super::mocks::StaticCatalog;

/// Search query the importer sends for a label name
pub fn label_query(label_name: &str) -> String {
    format!("label:\"{}\"", label_name)
}

pub fn artist_ref(external_id: &str) -> ArtistRef {
    ArtistRef {
        external_id: external_id.to_string(),
        name: format!("Artist {}", external_id),
    }
}

pub fn catalog_artist(external_id: &str, genres: &[&str]) -> CatalogArtist {
    CatalogArtist {
        external_id: external_id.to_string(),
        name: format!("Artist {}", external_id),
        genres: genres.iter().map(|g| g.to_string()).collect(),
        popularity: Some(40),
        followers: Some(1200),
        image_urls: vec![format!("https://images.example/{}.jpg", external_id)],
        external_url: None,
    }
}

/// Two-track release by artist `{id}-artist`, tracks `{id}-t1` and `{id}-t2`
pub fn catalog_release(external_id: &str, title: &str, label: Option<&str>) -> CatalogRelease {
    let artist = artist_ref(&format!("{}-artist", external_id));
    let tracks = (1..=2)
        .map(|n| CatalogTrack {
            external_id: format!("{}-t{}", external_id, n),
            title: format!("{} Part {}", title, n),
            duration_ms: 360_000,
            track_number: n,
            disc_number: 1,
            explicit: false,
            artists: vec![artist.clone()],
        })
        .collect();

    CatalogRelease {
        external_id: external_id.to_string(),
        title: title.to_string(),
        release_type: "album".to_string(),
        release_date: Some("2021-06-04".to_string()),
        total_tracks: 2,
        artwork_url: Some(format!("https://images.example/{}.jpg", external_id)),
        label: label.map(str::to_string),
        popularity: Some(35),
        genres: vec![],
        external_url: None,
        artists: vec![artist],
        tracks,
    }
}

/// Feature vector that fits the deep taxonomy profile
pub fn deep_track_features() -> TrackAudioFeatures {
    TrackAudioFeatures {
        energy: 0.5,
        tempo: 120.0,
        instrumentalness: 0.5,
        acousticness: 0.2,
        valence: 0.5,
        speechiness: 0.05,
        danceability: 0.5,
    }
}

pub fn deep_features() -> AudioFeatures {
    AudioFeatures::from(deep_track_features())
}

/// Import options without inter-page delay
pub fn fast_options(page_size: u32) -> ImportOptions {
    ImportOptions {
        page_size,
        page_delay: Duration::ZERO,
        max_pages: 20,
    }
}

/// Importer wired to in-memory stores
pub struct Harness {
    pub catalog: Arc<StaticCatalog>,
    pub store: MemoryStore,
    pub labels: MemoryLabelStore,
    pub importer: CatalogImporter,
}

impl Harness {
    pub fn new(labels: Vec<Label>) -> Self {
        Self::with_aliases(labels, LabelAliasTable::new())
    }

    pub fn with_aliases(labels: Vec<Label>, aliases: LabelAliasTable) -> Self {
        let catalog = Arc::new(StaticCatalog::new());
        let store = MemoryStore::new();
        let label_store = MemoryLabelStore::with_labels(labels);
        let importer = CatalogImporter::new(
            catalog.clone(),
            Arc::new(store.clone()),
            LabelCache::new(Arc::new(label_store.clone()), DEFAULT_LABEL_TTL),
            LabelMatcher::new(aliases),
        )
        .with_options(fast_options(2));

        Self {
            catalog,
            store,
            labels: label_store,
            importer,
        }
    }

    /// Replace the paging options the importer runs with
    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.importer = self.importer.with_options(options);
        self
    }
}
