//! Shared test utilities for Imprint workspace
//!
//! This crate provides a mock of the external music-catalog API so the
//! catalog client and the importer can be tested without network access.
//!
//! # Mock Services
//!
//! - [`MockCatalogServer`] - wiremock-backed catalog API
//!
//! # Fixtures
//!
//! - [`ReleaseFixture`], [`TrackFixture`], [`ArtistFixture`] - JSON builders
//!   in the catalog's wire format
//!
//! # Example
//!
//! ```rust,ignore
//! use imprint_test_utils::{MockCatalogServer, ReleaseFixture};
//!
//! #[tokio::test]
//! async fn test_with_mock_catalog() {
//!     let server = MockCatalogServer::start().await;
//!     server.mock_release(&ReleaseFixture::new("rel1", "Deep Cuts", "Build It Deep")).await;
//!
//!     // Point the catalog client at server.url() with server.token()
//! }
//! ```

mod catalog;

pub use catalog::{ArtistFixture, MockCatalogServer, ReleaseFixture, TrackFixture};
