//! Catalog entities: artists, releases and tracks
//!
//! `*Record` types are the attribute sets handed to the entity resolver.
//! The stored types add the internal id and know which fields an update is
//! allowed to touch.

use std::fmt;

use imprint_catalog_client::{CatalogArtist, CatalogRelease, CatalogTrack, TrackAudioFeatures};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Entity kinds keyed by external id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Artist,
    Release,
    Track,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Artist => "artist",
            Self::Release => "release",
            Self::Track => "track",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audio analysis summary for a track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub energy: f64,
    pub tempo: f64,
    pub instrumentalness: f64,
    pub acousticness: f64,
    pub valence: f64,
    pub speechiness: f64,
    pub danceability: f64,
}

impl From<TrackAudioFeatures> for AudioFeatures {
    fn from(f: TrackAudioFeatures) -> Self {
        Self {
            energy: f.energy,
            tempo: f.tempo,
            instrumentalness: f.instrumentalness,
            acousticness: f.acousticness,
            valence: f.valence,
            speechiness: f.speechiness,
            danceability: f.danceability,
        }
    }
}

/// Artist attributes as reported by the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistRecord {
    pub external_id: String,
    pub name: String,
    pub image_urls: Vec<String>,
    pub genres: Vec<String>,
    pub popularity: Option<i32>,
    pub followers: Option<i64>,
    pub external_url: Option<String>,
}

impl From<&CatalogArtist> for ArtistRecord {
    fn from(artist: &CatalogArtist) -> Self {
        Self {
            external_id: artist.external_id.clone(),
            name: artist.name.clone(),
            image_urls: artist.image_urls.clone(),
            genres: artist.genres.clone(),
            popularity: artist.popularity.map(|p| p as i32),
            followers: artist.followers.map(|f| f as i64),
            external_url: artist.external_url.clone(),
        }
    }
}

/// Release attributes plus the rows it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    pub external_id: String,
    pub title: String,
    /// Catalog precision: `2019`, `2019-05` or `2019-05-10`
    pub release_date: Option<String>,
    pub total_tracks: i32,
    pub artwork_url: Option<String>,
    pub label_id: Uuid,
    pub artist_ids: Vec<Uuid>,
    pub external_url: Option<String>,
    pub release_type: String,
    pub popularity: Option<i32>,
}

impl ReleaseRecord {
    pub fn from_catalog(release: &CatalogRelease, label_id: Uuid, artist_ids: Vec<Uuid>) -> Self {
        Self {
            external_id: release.external_id.clone(),
            title: release.title.clone(),
            release_date: release.release_date.clone(),
            total_tracks: release.total_tracks as i32,
            artwork_url: release.artwork_url.clone(),
            label_id,
            artist_ids,
            external_url: release.external_url.clone(),
            release_type: release.release_type.clone(),
            popularity: release.popularity.map(|p| p as i32),
        }
    }
}

/// Track attributes plus the rows it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub external_id: String,
    pub title: String,
    pub duration_ms: i32,
    pub track_number: i32,
    pub disc_number: i32,
    pub explicit: bool,
    pub release_id: Uuid,
    pub artist_ids: Vec<Uuid>,
    pub audio_features: Option<AudioFeatures>,
}

impl TrackRecord {
    pub fn from_catalog(
        track: &CatalogTrack,
        release_id: Uuid,
        artist_ids: Vec<Uuid>,
        audio_features: Option<AudioFeatures>,
    ) -> Self {
        Self {
            external_id: track.external_id.clone(),
            title: track.title.clone(),
            duration_ms: track.duration_ms as i32,
            track_number: track.track_number as i32,
            disc_number: track.disc_number as i32,
            explicit: track.explicit,
            release_id,
            artist_ids,
            audio_features,
        }
    }
}

/// Kind-specific attributes handed to the entity resolver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRecord {
    Artist(ArtistRecord),
    Release(ReleaseRecord),
    Track(TrackRecord),
}

impl EntityRecord {
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Artist(_) => EntityKind::Artist,
            Self::Release(_) => EntityKind::Release,
            Self::Track(_) => EntityKind::Track,
        }
    }

    pub fn external_id(&self) -> &str {
        match self {
            Self::Artist(a) => &a.external_id,
            Self::Release(r) => &r.external_id,
            Self::Track(t) => &t.external_id,
        }
    }

    /// Rows this record links to, which must already exist
    pub fn artist_ids(&self) -> &[Uuid] {
        match self {
            Self::Artist(_) => &[],
            Self::Release(r) => &r.artist_ids,
            Self::Track(t) => &t.artist_ids,
        }
    }
}

/// Stored artist row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Artist {
    pub id: Uuid,
    pub external_id: String,
    pub name: String,
    pub image_urls: Vec<String>,
    pub genres: Vec<String>,
    pub popularity: Option<i32>,
    pub followers: Option<i64>,
    pub external_url: Option<String>,
}

impl Artist {
    pub fn from_record(id: Uuid, record: &ArtistRecord) -> Self {
        Self {
            id,
            external_id: record.external_id.clone(),
            name: record.name.clone(),
            image_urls: record.image_urls.clone(),
            genres: record.genres.clone(),
            popularity: record.popularity,
            followers: record.followers,
            external_url: record.external_url.clone(),
        }
    }

    /// Refresh display fields; absent optional values keep what is stored
    pub fn apply(&mut self, record: &ArtistRecord) {
        self.name = record.name.clone();
        if !record.image_urls.is_empty() {
            self.image_urls = record.image_urls.clone();
        }
        self.genres = record.genres.clone();
        self.popularity = record.popularity.or(self.popularity);
        self.followers = record.followers.or(self.followers);
        self.external_url = record.external_url.clone().or(self.external_url.take());
    }
}

/// Stored release row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Release {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub release_date: Option<String>,
    pub total_tracks: i32,
    pub artwork_url: Option<String>,
    pub label_id: Uuid,
    pub external_url: Option<String>,
    pub release_type: String,
    pub popularity: Option<i32>,
}

impl Release {
    pub fn from_record(id: Uuid, record: &ReleaseRecord) -> Self {
        Self {
            id,
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            release_date: record.release_date.clone(),
            total_tracks: record.total_tracks,
            artwork_url: record.artwork_url.clone(),
            label_id: record.label_id,
            external_url: record.external_url.clone(),
            release_type: record.release_type.clone(),
            popularity: record.popularity,
        }
    }

    /// Refresh display fields; the owning label never changes
    pub fn apply(&mut self, record: &ReleaseRecord) {
        self.title = record.title.clone();
        self.release_date = record.release_date.clone().or(self.release_date.take());
        self.total_tracks = record.total_tracks;
        self.artwork_url = record.artwork_url.clone().or(self.artwork_url.take());
        self.external_url = record.external_url.clone().or(self.external_url.take());
        self.release_type = record.release_type.clone();
        self.popularity = record.popularity.or(self.popularity);
    }
}

/// Winning taxonomy stored against a track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackClassification {
    pub taxonomy: String,
    pub confidence: f64,
}

/// Stored track row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Track {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub duration_ms: i32,
    pub track_number: i32,
    pub disc_number: i32,
    pub explicit: bool,
    pub release_id: Uuid,
    pub audio_features: Option<AudioFeatures>,
    pub classification: Option<TrackClassification>,
}

impl Track {
    pub fn from_record(id: Uuid, record: &TrackRecord) -> Self {
        Self {
            id,
            external_id: record.external_id.clone(),
            title: record.title.clone(),
            duration_ms: record.duration_ms,
            track_number: record.track_number,
            disc_number: record.disc_number,
            explicit: record.explicit,
            release_id: record.release_id,
            audio_features: record.audio_features,
            classification: None,
        }
    }

    /// Refresh display fields; features are only replaced when provided
    pub fn apply(&mut self, record: &TrackRecord) {
        self.title = record.title.clone();
        self.duration_ms = record.duration_ms;
        self.track_number = record.track_number;
        self.disc_number = record.disc_number;
        self.explicit = record.explicit;
        if record.audio_features.is_some() {
            self.audio_features = record.audio_features;
        }
    }
}

/// Track awaiting classification, with genres gathered from its artists
#[derive(Debug, Clone, PartialEq)]
pub struct UntaggedTrack {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub explicit: bool,
    pub genres: Vec<String>,
    pub audio_features: Option<AudioFeatures>,
}
