//! Mock catalog server for testing the catalog client and import runs
//!
//! Provides a [`MockCatalogServer`] that serves the search, release, artist
//! and audio-feature endpoints of a Spotify-shaped catalog API.

use serde_json::json;
use wiremock::matchers::{header, method, path, path_regex, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mock catalog server
///
/// Wraps a [`wiremock::MockServer`]; every mount requires the bearer token
/// the server was started with, so a client sending the wrong token gets no
/// match (404) unless [`MockCatalogServer::mock_unauthorized`] is mounted.
///
/// # Example
///
/// ```rust,ignore
/// let server = MockCatalogServer::start().await;
/// let releases = vec![ReleaseFixture::new("rel1", "Deep Cuts", "Build It Deep")];
/// server.mock_search_page("label:\"Build It Deep\"", &releases, 0, 1, false).await;
/// ```
pub struct MockCatalogServer {
    server: MockServer,
    token: String,
}

impl MockCatalogServer {
    /// Start a new mock catalog with the default token
    pub async fn start() -> Self {
        Self::start_with_token("test-token").await
    }

    /// Start a new mock catalog with a custom token
    pub async fn start_with_token(token: &str) -> Self {
        let server = MockServer::start().await;
        Self {
            server,
            token: token.to_string(),
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get the bearer token the mounts expect
    pub fn token(&self) -> &str {
        &self.token
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Mount one page of release search results for `query` at `offset`
    pub async fn mock_search_page(
        &self,
        query: &str,
        releases: &[ReleaseFixture],
        offset: u32,
        total: u32,
        has_next: bool,
    ) {
        let items: Vec<serde_json::Value> = releases.iter().map(|r| r.to_summary_json()).collect();
        let next = has_next.then(|| format!("{}/v1/search?offset={}", self.url(), offset + 1));
        let auth = self.auth_header();

        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .and(query_param("q", query))
            .and(query_param("offset", offset.to_string().as_str()))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "albums": {
                    "items": items,
                    "total": total,
                    "limit": releases.len(),
                    "offset": offset,
                    "next": next
                }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount every page for `query`, splitting `releases` by `page_size`
    pub async fn mock_search_all(
        &self,
        query: &str,
        releases: &[ReleaseFixture],
        page_size: usize,
    ) {
        let total = releases.len() as u32;
        if releases.is_empty() {
            self.mock_search_page(query, &[], 0, 0, false).await;
            return;
        }
        for (index, chunk) in releases.chunks(page_size).enumerate() {
            let offset = (index * page_size) as u32;
            let has_next = offset + (chunk.len() as u32) < total;
            self.mock_search_page(query, chunk, offset, total, has_next).await;
        }
    }

    /// Mount full release detail
    pub async fn mock_release(&self, release: &ReleaseFixture) {
        let auth = self.auth_header();
        Mock::given(method("GET"))
            .and(path(format!("/v1/albums/{}", release.id).as_str()))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(release.to_json()))
            .mount(&self.server)
            .await;
    }

    /// Mount release detail whose embedded track listing claims a next page
    ///
    /// Pair with [`MockCatalogServer::mock_release_tracks_page`] at offset
    /// `release.tracks.len()`.
    pub async fn mock_release_truncated(&self, release: &ReleaseFixture) {
        let auth = self.auth_header();
        let mut body = release.to_json();
        body["tracks"]["next"] = json!(format!("{}/v1/albums/{}/tracks", self.url(), release.id));
        Mock::given(method("GET"))
            .and(path(format!("/v1/albums/{}", release.id).as_str()))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount an error status for one release
    pub async fn mock_release_error(&self, release_id: &str, status_code: u16) {
        let auth = self.auth_header();
        Mock::given(method("GET"))
            .and(path(format!("/v1/albums/{}", release_id).as_str()))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(status_code).set_body_json(json!({
                "error": {"status": status_code, "message": "release lookup failed"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a paged track listing for a release
    pub async fn mock_release_tracks_page(
        &self,
        release_id: &str,
        tracks: &[TrackFixture],
        offset: u32,
        has_next: bool,
    ) {
        let auth = self.auth_header();
        let items: Vec<serde_json::Value> = tracks.iter().map(|t| t.to_json()).collect();
        let next = has_next.then(|| "next".to_string());
        Mock::given(method("GET"))
            .and(path(format!("/v1/albums/{}/tracks", release_id).as_str()))
            .and(query_param("offset", offset.to_string().as_str()))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": items,
                "total": offset as usize + tracks.len(),
                "limit": tracks.len(),
                "offset": offset,
                "next": next
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount artist detail
    pub async fn mock_artist(&self, artist: &ArtistFixture) {
        let auth = self.auth_header();
        Mock::given(method("GET"))
            .and(path(format!("/v1/artists/{}", artist.id).as_str()))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(artist.to_json()))
            .mount(&self.server)
            .await;
    }

    /// Mount audio features; tracks not listed come back as `null`
    pub async fn mock_audio_features(&self, features: &[(&str, f64, f64)]) {
        let auth = self.auth_header();
        let items: Vec<serde_json::Value> = features
            .iter()
            .map(|(id, energy, tempo)| {
                json!({
                    "id": id,
                    "energy": energy,
                    "tempo": tempo,
                    "instrumentalness": 0.5,
                    "acousticness": 0.2,
                    "valence": 0.5,
                    "speechiness": 0.05,
                    "danceability": 0.7
                })
            })
            .collect();

        Mock::given(method("GET"))
            .and(path("/v1/audio-features"))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audio_features": items
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a 401 for requests carrying `bad_token`
    ///
    /// Only matches the given token, so valid-token mounts are unaffected.
    pub async fn mock_unauthorized(&self, bad_token: &str) {
        let auth = format!("Bearer {}", bad_token);
        Mock::given(method("GET"))
            .and(path_regex("^/v1/.*"))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {"status": 401, "message": "Invalid access token"}
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a server error for every endpoint
    pub async fn mock_server_error(&self, error_message: &str) {
        let auth = self.auth_header();
        Mock::given(method("GET"))
            .and(path_regex("^/v1/.*"))
            .and(header("Authorization", auth.as_str()))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": {"status": 500, "message": error_message}
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount rate limiting for every endpoint
    pub async fn mock_rate_limit(&self) {
        let auth = self.auth_header();
        Mock::given(method("GET"))
            .and(path_regex("^/v1/.*"))
            .and(header("Authorization", auth.as_str()))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", "30")
                    .set_body_json(json!({
                        "error": {"status": 429, "message": "API rate limit exceeded"}
                    })),
            )
            .mount(&self.server)
            .await;
    }

    /// Requests received so far (for asserting call counts)
    pub async fn received_request_count(&self) -> usize {
        self.server
            .received_requests()
            .await
            .map(|r| r.len())
            .unwrap_or(0)
    }
}

/// Fixture for catalog artist responses
#[derive(Debug, Clone)]
pub struct ArtistFixture {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
    pub popularity: u32,
    pub followers: u64,
    pub image_url: Option<String>,
}

impl ArtistFixture {
    /// Create an artist with one image and a single genre
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            genres: vec!["deep-house".to_string()],
            popularity: 40,
            followers: 1200,
            image_url: Some(format!("https://images.example/{}.jpg", id)),
        }
    }

    /// Replace the genre list
    pub fn with_genres(mut self, genres: &[&str]) -> Self {
        self.genres = genres.iter().map(|g| g.to_string()).collect();
        self
    }

    /// Simplified reference as embedded in releases and tracks
    pub fn to_ref_json(&self) -> serde_json::Value {
        json!({"id": self.id, "name": self.name})
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        let images: Vec<serde_json::Value> = self
            .image_url
            .iter()
            .map(|url| json!({"url": url, "width": 640, "height": 640}))
            .collect();
        json!({
            "id": self.id,
            "name": self.name,
            "genres": self.genres,
            "popularity": self.popularity,
            "followers": {"total": self.followers},
            "images": images,
            "external_urls": {"spotify": format!("https://open.example/artist/{}", self.id)}
        })
    }
}

/// Fixture for tracks embedded in a release
#[derive(Debug, Clone)]
pub struct TrackFixture {
    pub id: String,
    pub name: String,
    pub duration_ms: u32,
    pub track_number: u32,
    pub disc_number: u32,
    pub explicit: bool,
    pub artists: Vec<ArtistFixture>,
}

impl TrackFixture {
    /// Create a track credited to `artists`
    pub fn new(id: &str, name: &str, track_number: u32, artists: Vec<ArtistFixture>) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            duration_ms: 360_000,
            track_number,
            disc_number: 1,
            explicit: false,
            artists,
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "duration_ms": self.duration_ms,
            "track_number": self.track_number,
            "disc_number": self.disc_number,
            "explicit": self.explicit,
            "artists": self.artists.iter().map(|a| a.to_ref_json()).collect::<Vec<_>>()
        })
    }
}

/// Fixture for release responses
#[derive(Debug, Clone)]
pub struct ReleaseFixture {
    pub id: String,
    pub name: String,
    pub label: Option<String>,
    pub release_date: String,
    pub artists: Vec<ArtistFixture>,
    pub tracks: Vec<TrackFixture>,
}

impl ReleaseFixture {
    /// Create a two-track release by a single artist on `label`
    pub fn new(id: &str, name: &str, label: &str) -> Self {
        let artist = ArtistFixture::new(&format!("{}-artist", id), &format!("{} Artist", name));
        let tracks = (1..=2)
            .map(|n| {
                TrackFixture::new(
                    &format!("{}-t{}", id, n),
                    &format!("{} Part {}", name, n),
                    n,
                    vec![artist.clone()],
                )
            })
            .collect();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            label: Some(label.to_string()),
            release_date: "2021-06-04".to_string(),
            artists: vec![artist],
            tracks,
        }
    }

    /// Every artist credited on the release or its tracks, once each
    pub fn all_artists(&self) -> Vec<ArtistFixture> {
        let mut seen = Vec::<String>::new();
        let mut artists = Vec::new();
        for artist in self
            .artists
            .iter()
            .chain(self.tracks.iter().flat_map(|t| t.artists.iter()))
        {
            if !seen.contains(&artist.id) {
                seen.push(artist.id.clone());
                artists.push(artist.clone());
            }
        }
        artists
    }

    /// Search-result shape (no label, no tracks)
    pub fn to_summary_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "album_type": "album",
            "release_date": self.release_date,
            "total_tracks": self.tracks.len(),
            "artists": self.artists.iter().map(|a| a.to_ref_json()).collect::<Vec<_>>()
        })
    }

    /// Full release shape with embedded track listing
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "album_type": "album",
            "release_date": self.release_date,
            "total_tracks": self.tracks.len(),
            "label": self.label,
            "popularity": 35,
            "genres": [],
            "images": [{"url": format!("https://images.example/{}.jpg", self.id), "width": 640}],
            "external_urls": {"spotify": format!("https://open.example/album/{}", self.id)},
            "artists": self.artists.iter().map(|a| a.to_ref_json()).collect::<Vec<_>>(),
            "tracks": {
                "items": self.tracks.iter().map(|t| t.to_json()).collect::<Vec<_>>(),
                "total": self.tracks.len(),
                "limit": 50,
                "offset": 0,
                "next": null
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_catalog_server_starts() {
        let server = MockCatalogServer::start().await;
        assert!(server.url().starts_with("http://"));
        assert_eq!(server.token(), "test-token");
    }

    #[tokio::test]
    async fn test_mock_release_requires_token() {
        let server = MockCatalogServer::start().await;
        server
            .mock_release(&ReleaseFixture::new("rel1", "Deep Cuts", "Build It Deep"))
            .await;

        let client = reqwest::Client::new();
        let response = client
            .get(format!("{}/v1/albums/rel1", server.url()))
            .header("Authorization", "Bearer test-token")
            .send()
            .await
            .unwrap();
        assert!(response.status().is_success());

        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["label"], "Build It Deep");
        assert_eq!(body["tracks"]["items"].as_array().unwrap().len(), 2);

        let anonymous = client
            .get(format!("{}/v1/albums/rel1", server.url()))
            .send()
            .await
            .unwrap();
        assert_eq!(anonymous.status().as_u16(), 404);
    }

    #[test]
    fn test_all_artists_deduplicates() {
        let release = ReleaseFixture::new("rel1", "Deep Cuts", "Build It Deep");
        let artists = release.all_artists();
        assert_eq!(artists.len(), 1);
        assert_eq!(artists[0].id, "rel1-artist");
    }
}
