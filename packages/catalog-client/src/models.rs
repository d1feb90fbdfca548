//! Catalog API response models
//!
//! Public types are the validated shapes handed to callers. The `Raw*`
//! types mirror the wire format and are only used for deserialization.

use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, CatalogResult};

/// Largest page the catalog accepts for search and track listings
pub const MAX_PAGE_SIZE: u32 = 50;

/// Entity kinds the search endpoint can return
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchType {
    Release,
    Artist,
    Track,
}

impl SearchType {
    /// Value used in the `type` query parameter
    pub fn as_query_value(&self) -> &'static str {
        match self {
            Self::Release => "album",
            Self::Artist => "artist",
            Self::Track => "track",
        }
    }
}

/// Page window for paginated endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: u32,
    pub offset: u32,
}

impl PageRequest {
    /// Create a page window, clamping the limit to `1..=MAX_PAGE_SIZE`
    pub fn new(limit: u32, offset: u32) -> Self {
        Self {
            limit: limit.clamp(1, MAX_PAGE_SIZE),
            offset,
        }
    }

    /// The window immediately after this one
    pub fn next(&self) -> Self {
        Self {
            limit: self.limit,
            offset: self.offset + self.limit,
        }
    }
}

/// Reference to an artist as embedded in releases and tracks
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtistRef {
    pub external_id: String,
    pub name: String,
}

/// Release as listed in search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseSummary {
    pub external_id: String,
    pub title: String,
    pub release_type: String,
    pub release_date: Option<String>,
    pub total_tracks: u32,
    pub artists: Vec<ArtistRef>,
}

/// One search hit, tagged by entity kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchItem {
    Release(ReleaseSummary),
    Artist(ArtistRef),
    Track(TrackHit),
}

/// Track as listed in search results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackHit {
    pub external_id: String,
    pub title: String,
    pub release_external_id: Option<String>,
}

impl SearchItem {
    /// External id of the hit regardless of kind
    pub fn external_id(&self) -> &str {
        match self {
            Self::Release(r) => &r.external_id,
            Self::Artist(a) => &a.external_id,
            Self::Track(t) => &t.external_id,
        }
    }
}

/// One page of search results across the requested kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPage {
    pub items: Vec<SearchItem>,
    /// Largest total reported by any requested kind
    pub total: u32,
    pub limit: u32,
    pub offset: u32,
    /// Whether any requested kind reports a further page
    pub has_more: bool,
}

impl SearchPage {
    /// Release hits on this page
    pub fn releases(&self) -> impl Iterator<Item = &ReleaseSummary> {
        self.items.iter().filter_map(|item| match item {
            SearchItem::Release(r) => Some(r),
            _ => None,
        })
    }
}

/// Track within a full release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogTrack {
    pub external_id: String,
    pub title: String,
    pub duration_ms: u32,
    pub track_number: u32,
    pub disc_number: u32,
    pub explicit: bool,
    pub artists: Vec<ArtistRef>,
}

/// Full release detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRelease {
    pub external_id: String,
    pub title: String,
    pub release_type: String,
    /// Catalog precision varies: `2019`, `2019-05` or `2019-05-10`
    pub release_date: Option<String>,
    pub total_tracks: u32,
    pub artwork_url: Option<String>,
    /// Label string as reported by the catalog, not normalized
    pub label: Option<String>,
    pub popularity: Option<u32>,
    pub genres: Vec<String>,
    pub external_url: Option<String>,
    pub artists: Vec<ArtistRef>,
    pub tracks: Vec<CatalogTrack>,
}

impl CatalogRelease {
    /// Every artist credited on the release or any of its tracks, release
    /// artists first, without duplicates
    pub fn contributing_artists(&self) -> Vec<ArtistRef> {
        let mut seen = std::collections::HashSet::new();
        self.artists
            .iter()
            .chain(self.tracks.iter().flat_map(|t| t.artists.iter()))
            .filter(|a| seen.insert(a.external_id.clone()))
            .cloned()
            .collect()
    }
}

/// Full artist detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogArtist {
    pub external_id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
    pub followers: Option<u64>,
    pub image_urls: Vec<String>,
    pub external_url: Option<String>,
}

/// Audio analysis summary for one track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackAudioFeatures {
    pub energy: f64,
    pub tempo: f64,
    pub instrumentalness: f64,
    pub acousticness: f64,
    pub valence: f64,
    pub speechiness: f64,
    pub danceability: f64,
}

// Internal response types for deserialization

#[derive(Debug, Deserialize)]
pub(crate) struct RawPaging<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub offset: u32,
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSearchResponse {
    pub albums: Option<RawPaging<RawSimplifiedAlbum>>,
    pub artists: Option<RawPaging<RawSimplifiedArtist>>,
    pub tracks: Option<RawPaging<RawSimplifiedTrack>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawImage {
    pub url: String,
    pub width: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSimplifiedArtist {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSimplifiedAlbum {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub album_type: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub artists: Vec<RawSimplifiedArtist>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawSimplifiedTrack {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub duration_ms: u32,
    #[serde(default = "default_number")]
    pub track_number: u32,
    #[serde(default = "default_number")]
    pub disc_number: u32,
    #[serde(default)]
    pub explicit: bool,
    #[serde(default)]
    pub artists: Vec<RawSimplifiedArtist>,
    pub album: Option<RawAlbumRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAlbumRef {
    pub id: Option<String>,
}

fn default_number() -> u32 {
    1
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAlbum {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub album_type: Option<String>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub total_tracks: u32,
    #[serde(default)]
    pub images: Vec<RawImage>,
    pub label: Option<String>,
    pub popularity: Option<u32>,
    #[serde(default)]
    pub genres: Vec<String>,
    pub external_urls: Option<RawExternalUrls>,
    #[serde(default)]
    pub artists: Vec<RawSimplifiedArtist>,
    pub tracks: Option<RawPaging<RawSimplifiedTrack>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawFollowers {
    pub total: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawArtist {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
    pub popularity: Option<u32>,
    pub followers: Option<RawFollowers>,
    #[serde(default)]
    pub images: Vec<RawImage>,
    pub external_urls: Option<RawExternalUrls>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAudioFeaturesResponse {
    #[serde(default)]
    pub audio_features: Vec<Option<RawAudioFeatures>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RawAudioFeatures {
    pub id: String,
    pub energy: f64,
    pub tempo: f64,
    pub instrumentalness: f64,
    pub acousticness: f64,
    pub valence: f64,
    pub speechiness: f64,
    pub danceability: f64,
}

/// Catalog error payload, e.g. `{"error": {"status": 404, "message": "..."}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub status: Option<u16>,
    pub message: String,
}

fn require(value: String, what: &str) -> CatalogResult<String> {
    if value.trim().is_empty() {
        return Err(CatalogError::Malformed(format!("{} is empty", what)));
    }
    Ok(value)
}

/// Largest image first; the catalog does not guarantee ordering
fn image_urls(mut images: Vec<RawImage>) -> Vec<String> {
    images.sort_by(|a, b| b.width.unwrap_or(0).cmp(&a.width.unwrap_or(0)));
    images.into_iter().map(|i| i.url).collect()
}

impl TryFrom<RawSimplifiedArtist> for ArtistRef {
    type Error = CatalogError;

    fn try_from(raw: RawSimplifiedArtist) -> CatalogResult<Self> {
        Ok(Self {
            external_id: require(raw.id, "artist id")?,
            name: require(raw.name, "artist name")?,
        })
    }
}

fn artist_refs(raw: Vec<RawSimplifiedArtist>) -> CatalogResult<Vec<ArtistRef>> {
    raw.into_iter().map(ArtistRef::try_from).collect()
}

impl TryFrom<RawSimplifiedAlbum> for ReleaseSummary {
    type Error = CatalogError;

    fn try_from(raw: RawSimplifiedAlbum) -> CatalogResult<Self> {
        Ok(Self {
            external_id: require(raw.id, "release id")?,
            title: require(raw.name, "release title")?,
            release_type: raw.album_type.unwrap_or_else(|| "album".to_string()),
            release_date: raw.release_date.filter(|d| !d.is_empty()),
            total_tracks: raw.total_tracks,
            artists: artist_refs(raw.artists)?,
        })
    }
}

impl TryFrom<RawSimplifiedTrack> for CatalogTrack {
    type Error = CatalogError;

    fn try_from(raw: RawSimplifiedTrack) -> CatalogResult<Self> {
        Ok(Self {
            external_id: require(raw.id, "track id")?,
            title: require(raw.name, "track title")?,
            duration_ms: raw.duration_ms,
            track_number: raw.track_number,
            disc_number: raw.disc_number,
            explicit: raw.explicit,
            artists: artist_refs(raw.artists)?,
        })
    }
}

impl TryFrom<RawSimplifiedTrack> for TrackHit {
    type Error = CatalogError;

    fn try_from(raw: RawSimplifiedTrack) -> CatalogResult<Self> {
        Ok(Self {
            external_id: require(raw.id, "track id")?,
            title: require(raw.name, "track title")?,
            release_external_id: raw.album.and_then(|a| a.id),
        })
    }
}

impl RawAlbum {
    /// Convert into a release, using `tracks` as the complete listing
    ///
    /// The embedded track page may be truncated; the client passes the
    /// fully paged listing here.
    pub(crate) fn into_release(self, tracks: Vec<CatalogTrack>) -> CatalogResult<CatalogRelease> {
        Ok(CatalogRelease {
            external_id: require(self.id, "release id")?,
            title: require(self.name, "release title")?,
            release_type: self.album_type.unwrap_or_else(|| "album".to_string()),
            release_date: self.release_date.filter(|d| !d.is_empty()),
            total_tracks: self.total_tracks,
            artwork_url: image_urls(self.images).into_iter().next(),
            label: self.label.filter(|l| !l.trim().is_empty()),
            popularity: self.popularity,
            genres: self.genres,
            external_url: self.external_urls.and_then(|u| u.spotify),
            artists: artist_refs(self.artists)?,
            tracks,
        })
    }
}

impl TryFrom<RawArtist> for CatalogArtist {
    type Error = CatalogError;

    fn try_from(raw: RawArtist) -> CatalogResult<Self> {
        Ok(Self {
            external_id: require(raw.id, "artist id")?,
            name: require(raw.name, "artist name")?,
            genres: raw.genres,
            popularity: raw.popularity,
            followers: raw.followers.and_then(|f| f.total),
            image_urls: image_urls(raw.images),
            external_url: raw.external_urls.and_then(|u| u.spotify),
        })
    }
}

impl From<RawAudioFeatures> for TrackAudioFeatures {
    fn from(raw: RawAudioFeatures) -> Self {
        Self {
            energy: raw.energy,
            tempo: raw.tempo,
            instrumentalness: raw.instrumentalness,
            acousticness: raw.acousticness,
            valence: raw.valence,
            speechiness: raw.speechiness,
            danceability: raw.danceability,
        }
    }
}

impl RawSearchResponse {
    /// Flatten per-kind pages into one tagged page
    pub(crate) fn into_page(self, request: PageRequest) -> CatalogResult<SearchPage> {
        let mut items = Vec::new();
        let mut total = 0;
        let mut has_more = false;

        if let Some(albums) = self.albums {
            total = total.max(albums.total);
            has_more |= albums.next.is_some();
            for raw in albums.items {
                items.push(SearchItem::Release(ReleaseSummary::try_from(raw)?));
            }
        }
        if let Some(artists) = self.artists {
            total = total.max(artists.total);
            has_more |= artists.next.is_some();
            for raw in artists.items {
                items.push(SearchItem::Artist(ArtistRef::try_from(raw)?));
            }
        }
        if let Some(tracks) = self.tracks {
            total = total.max(tracks.total);
            has_more |= tracks.next.is_some();
            for raw in tracks.items {
                items.push(SearchItem::Track(TrackHit::try_from(raw)?));
            }
        }

        Ok(SearchPage {
            items,
            total,
            limit: request.limit,
            offset: request.offset,
            has_more,
        })
    }
}
