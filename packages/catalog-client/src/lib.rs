//! External music-catalog API client for Imprint
//!
//! This crate talks to a Spotify-shaped catalog Web API and provides:
//! - Paginated search for releases, artists and tracks
//! - Full release detail including the complete track listing
//! - Artist detail with images, genres and popularity
//! - Batched audio-feature lookup for tracks
//!
//! Every response is deserialized into private raw structs and converted
//! once into the validated public models, so callers never see a release
//! without an id or a track without a title.
//!
//! # Example
//!
//! ```rust,no_run
//! use imprint_catalog_client::{CatalogClient, PageRequest, SearchType};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = CatalogClient::new("https://api.spotify.com", "token")?;
//!
//! let page = client
//!     .search("label:\"Build It Records\"", &[SearchType::Release], PageRequest::new(50, 0))
//!     .await?;
//! for item in page.items {
//!     println!("{}", item.external_id());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Environment Variables
//!
//! - `CATALOG_API_TOKEN`: bearer token (required)
//! - `CATALOG_API_URL`: API base URL (default: `https://api.spotify.com`)

mod client;
mod error;
mod models;

pub use client::CatalogClient;
pub use error::{CatalogError, CatalogResult};
pub use models::{
    ArtistRef, CatalogArtist, CatalogRelease, CatalogTrack, PageRequest, ReleaseSummary,
    SearchItem, SearchPage, SearchType, TrackAudioFeatures, TrackHit, MAX_PAGE_SIZE,
};
