//! Catalog API client implementation

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use imprint_shared_config::CatalogConfig;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    CatalogArtist, CatalogRelease, CatalogTrack, ErrorResponse, PageRequest, RawAlbum, RawArtist,
    RawAudioFeaturesResponse, RawPaging, RawSearchResponse, RawSimplifiedTrack, SearchPage,
    SearchType, TrackAudioFeatures, MAX_PAGE_SIZE,
};

/// Default connection timeout in seconds
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Maximum query or id length accepted before a request is sent
const MAX_INPUT_LENGTH: usize = 256;

/// Audio features endpoint accepts at most this many ids per call
const AUDIO_FEATURES_BATCH: usize = 100;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 100;

/// External catalog API client
#[derive(Clone)]
pub struct CatalogClient {
    http_client: Client,
    config: CatalogConfig,
}

impl fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogClient")
            .field("base_url", &self.config.base_url)
            .field("api_token", &"[REDACTED]")
            .field("max_retries", &self.config.max_retries)
            .finish()
    }
}

impl CatalogClient {
    /// Create a client for `base_url` with default timeouts and retries
    ///
    /// # Errors
    /// Returns `CatalogError::MissingToken` if the token is empty
    pub fn new(base_url: impl Into<String>, api_token: impl Into<String>) -> CatalogResult<Self> {
        Self::from_config(&CatalogConfig::new(base_url, api_token))
    }

    /// Create a client from shared configuration
    pub fn from_config(config: &CatalogConfig) -> CatalogResult<Self> {
        if config.api_token.trim().is_empty() {
            return Err(CatalogError::MissingToken);
        }

        let http_client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .pool_max_idle_per_host(5)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent("Imprint/1.0")
            .build()?;

        Ok(Self {
            http_client,
            config: config.clone(),
        })
    }

    /// Override the number of retries for transient failures
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Validate a free-text query or entity id before it reaches the URL
    fn validate_input<'a>(value: &'a str, what: &str) -> CatalogResult<&'a str> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::InvalidInput(format!("{} cannot be empty", what)));
        }
        if trimmed.len() > MAX_INPUT_LENGTH {
            return Err(CatalogError::InvalidInput(format!(
                "{} too long (max {} characters)",
                what, MAX_INPUT_LENGTH
            )));
        }
        Ok(trimmed)
    }

    fn validate_id<'a>(id: &'a str, what: &str) -> CatalogResult<&'a str> {
        let id = Self::validate_input(id, what)?;
        if id.contains('/') || id.contains('?') {
            return Err(CatalogError::InvalidInput(format!(
                "{} contains reserved characters",
                what
            )));
        }
        Ok(id)
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> CatalogResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    attempt += 1;
                    let delay_ms = RETRY_BASE_DELAY_MS * 2u64.pow(attempt);
                    warn!(
                        attempt = attempt,
                        max_retries = self.config.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Make one GET request and map the status into typed errors
    async fn request_once<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> CatalogResult<T> {
        let response = self
            .http_client
            .get(self.config.api_url(path))
            .bearer_auth(&self.config.api_token)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CatalogError::Timeout
                } else {
                    CatalogError::Http(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await.map_err(CatalogError::Http)?;

        match status {
            s if s.is_success() => Ok(serde_json::from_str(&text)?),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(CatalogError::Unauthorized),
            StatusCode::NOT_FOUND => Err(CatalogError::NotFound(path.to_string())),
            StatusCode::TOO_MANY_REQUESTS => {
                warn!(path = %path, "Catalog API rate limited");
                Err(CatalogError::RateLimited)
            }
            s => {
                let message = serde_json::from_str::<ErrorResponse>(&text)
                    .map(|e| e.error.message)
                    .unwrap_or(text);
                Err(CatalogError::Api {
                    status: s.as_u16(),
                    message,
                })
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> CatalogResult<T> {
        self.with_retry(|| self.request_once(path, query)).await
    }

    /// Search the catalog
    ///
    /// # Arguments
    /// * `query` - Search expression, e.g. `label:"Build It Records"`
    /// * `types` - Entity kinds to include; must not be empty
    /// * `page` - Page window (limit is clamped to 50)
    ///
    /// # Errors
    /// - `CatalogError::InvalidInput` - empty query or no types
    /// - `CatalogError::Malformed` - a hit without id or name
    /// - `CatalogError::Unauthorized` - token rejected
    #[instrument(skip(self))]
    pub async fn search(
        &self,
        query: &str,
        types: &[SearchType],
        page: PageRequest,
    ) -> CatalogResult<SearchPage> {
        let query = Self::validate_input(query, "search query")?;
        if types.is_empty() {
            return Err(CatalogError::InvalidInput(
                "at least one search type is required".to_string(),
            ));
        }
        let page = PageRequest::new(page.limit, page.offset);
        let type_param = types
            .iter()
            .map(SearchType::as_query_value)
            .collect::<Vec<_>>()
            .join(",");

        debug!(query = %query, limit = page.limit, offset = page.offset, "Searching catalog");

        let raw: RawSearchResponse = self
            .get_json(
                "search",
                &[
                    ("q", query.to_string()),
                    ("type", type_param),
                    ("limit", page.limit.to_string()),
                    ("offset", page.offset.to_string()),
                ],
            )
            .await?;

        let result = raw.into_page(page)?;

        debug!(
            query = %query,
            result_count = result.items.len(),
            total = result.total,
            has_more = result.has_more,
            "Catalog search page received"
        );

        Ok(result)
    }

    /// Fetch a release with its complete track listing
    ///
    /// Follows the track pagination when the embedded listing is truncated.
    #[instrument(skip(self))]
    pub async fn get_release(&self, release_id: &str) -> CatalogResult<CatalogRelease> {
        let release_id = Self::validate_id(release_id, "release id")?;

        let mut raw: RawAlbum = self.get_json(&format!("albums/{}", release_id), &[]).await?;

        let mut tracks = Vec::new();
        let mut next_page = None;
        if let Some(embedded) = raw.tracks.take() {
            if embedded.next.is_some() {
                let offset = embedded.offset + embedded.items.len() as u32;
                next_page = Some(PageRequest::new(MAX_PAGE_SIZE, offset));
            }
            for track in embedded.items {
                tracks.push(CatalogTrack::try_from(track)?);
            }
        }

        while let Some(page) = next_page {
            let listing: RawPaging<RawSimplifiedTrack> = self
                .get_json(
                    &format!("albums/{}/tracks", release_id),
                    &[
                        ("limit", page.limit.to_string()),
                        ("offset", page.offset.to_string()),
                    ],
                )
                .await?;
            let received = listing.items.len() as u32;
            for track in listing.items {
                tracks.push(CatalogTrack::try_from(track)?);
            }
            next_page = match listing.next {
                Some(_) if received > 0 => {
                    Some(PageRequest::new(page.limit, page.offset + received))
                }
                _ => None,
            };
        }

        let release = raw.into_release(tracks)?;

        debug!(
            release_id = %release.external_id,
            title = %release.title,
            track_count = release.tracks.len(),
            "Fetched catalog release"
        );

        Ok(release)
    }

    /// Fetch artist detail with images, genres and popularity
    #[instrument(skip(self))]
    pub async fn get_artist(&self, artist_id: &str) -> CatalogResult<CatalogArtist> {
        let artist_id = Self::validate_id(artist_id, "artist id")?;
        let raw: RawArtist = self.get_json(&format!("artists/{}", artist_id), &[]).await?;
        CatalogArtist::try_from(raw)
    }

    /// Fetch audio features for tracks, keyed by track id
    ///
    /// Tracks the catalog has no analysis for are absent from the map.
    #[instrument(skip(self, track_ids), fields(count = track_ids.len()))]
    pub async fn get_audio_features(
        &self,
        track_ids: &[String],
    ) -> CatalogResult<HashMap<String, TrackAudioFeatures>> {
        let mut features = HashMap::new();

        for batch in track_ids.chunks(AUDIO_FEATURES_BATCH) {
            let ids = batch
                .iter()
                .map(|id| Self::validate_id(id, "track id"))
                .collect::<CatalogResult<Vec<_>>>()?
                .join(",");

            let response: RawAudioFeaturesResponse =
                self.get_json("audio-features", &[("ids", ids)]).await?;

            for raw in response.audio_features.into_iter().flatten() {
                let id = raw.id.clone();
                features.insert(id, TrackAudioFeatures::from(raw));
            }
        }

        Ok(features)
    }
}
