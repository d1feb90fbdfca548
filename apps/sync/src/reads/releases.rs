//! Release read paths over Postgres
//!
//! Each read is a fallback chain: a joined query with artist names and track
//! counts, a single-table query, and for lists a placeholder entry so callers
//! always have something to render.

use serde::Serialize;
use sqlx::postgres::PgPool;
use sqlx::FromRow;
use uuid::Uuid;

use super::fallback::{DataSource, FallbackQueryReconciler, FnStrategy};
use crate::error::{SyncError, SyncResult};

/// Sentinel artist credit for placeholder and artist-less releases
pub const VARIOUS_ARTISTS: &str = "Various Artists";

/// Artwork shown when a release has none
pub const PLACEHOLDER_ARTWORK_URL: &str = "/static/artwork/placeholder.png";

#[derive(Debug, Clone, PartialEq, FromRow, Serialize)]
pub struct ReleaseListing {
    pub id: Uuid,
    pub external_id: String,
    pub title: String,
    pub release_date: Option<String>,
    pub artwork_url: Option<String>,
    /// Comma-separated credits; absent when read without joins
    pub artist_names: Option<String>,
    pub track_count: Option<i64>,
}

impl ReleaseListing {
    /// Artist credit to display
    pub fn artist_credit(&self) -> &str {
        match self.artist_names.as_deref() {
            Some(names) if !names.is_empty() => names,
            _ => VARIOUS_ARTISTS,
        }
    }

    pub fn artwork(&self) -> &str {
        self.artwork_url.as_deref().unwrap_or(PLACEHOLDER_ARTWORK_URL)
    }

    pub fn is_placeholder(&self) -> bool {
        self.id.is_nil()
    }
}

/// Renderable stand-in when no release query succeeds
pub fn placeholder_listing() -> ReleaseListing {
    ReleaseListing {
        id: Uuid::nil(),
        external_id: String::new(),
        title: "Releases unavailable".to_string(),
        release_date: None,
        artwork_url: Some(PLACEHOLDER_ARTWORK_URL.to_string()),
        artist_names: Some(VARIOUS_ARTISTS.to_string()),
        track_count: Some(0),
    }
}

const JOINED_SELECT: &str = r#"
    SELECT r.id, r.external_id, r.title, r.release_date, r.artwork_url,
           string_agg(DISTINCT a.name, ', ') AS artist_names,
           COUNT(DISTINCT t.id) AS track_count
    FROM releases r
    LEFT JOIN release_artists ra ON ra.release_id = r.id
    LEFT JOIN artists a ON a.id = ra.artist_id
    LEFT JOIN tracks t ON t.release_id = r.id
"#;

const JOINED_GROUP: &str =
    "GROUP BY r.id, r.external_id, r.title, r.release_date, r.artwork_url";

const PLAIN_SELECT: &str = r#"
    SELECT id, external_id, title, release_date, artwork_url,
           NULL::text AS artist_names,
           total_tracks::bigint AS track_count
    FROM releases
"#;

async fn joined_by_label(pool: PgPool, label_id: Uuid) -> SyncResult<Vec<ReleaseListing>> {
    let sql = format!(
        "{} WHERE r.label_id = $1 {} ORDER BY r.release_date DESC NULLS LAST, r.title",
        JOINED_SELECT, JOINED_GROUP
    );
    let rows = sqlx::query_as::<_, ReleaseListing>(&sql)
        .bind(label_id)
        .fetch_all(&pool)
        .await?;
    Ok(rows)
}

async fn plain_by_label(pool: PgPool, label_id: Uuid) -> SyncResult<Vec<ReleaseListing>> {
    let sql = format!(
        "{} WHERE label_id = $1 ORDER BY release_date DESC NULLS LAST, title",
        PLAIN_SELECT
    );
    let rows = sqlx::query_as::<_, ReleaseListing>(&sql)
        .bind(label_id)
        .fetch_all(&pool)
        .await?;
    Ok(rows)
}

async fn joined_by_id(pool: PgPool, id: Uuid) -> SyncResult<Option<ReleaseListing>> {
    let sql = format!("{} WHERE r.id = $1 {}", JOINED_SELECT, JOINED_GROUP);
    let row = sqlx::query_as::<_, ReleaseListing>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    Ok(row)
}

async fn plain_by_id(pool: PgPool, id: Uuid) -> SyncResult<Option<ReleaseListing>> {
    let sql = format!("{} WHERE id = $1", PLAIN_SELECT);
    let row = sqlx::query_as::<_, ReleaseListing>(&sql)
        .bind(id)
        .fetch_optional(&pool)
        .await?;
    Ok(row)
}

/// Releases of one label, newest first
pub fn releases_by_label(pool: &PgPool) -> FallbackQueryReconciler<Uuid, Vec<ReleaseListing>> {
    let joined = pool.clone();
    let plain = pool.clone();
    FallbackQueryReconciler::new("releases")
        .with_strategy(FnStrategy::new(DataSource::Primary, move |label_id: Uuid| {
            joined_by_label(joined.clone(), label_id)
        }))
        .with_strategy(FnStrategy::new(DataSource::Simplified, move |label_id: Uuid| {
            plain_by_label(plain.clone(), label_id)
        }))
        .with_strategy(FnStrategy::new(DataSource::Placeholder, |_: Uuid| async {
            Ok::<_, SyncError>(vec![placeholder_listing()])
        }))
}

/// One release by internal id
pub fn release_by_id(pool: &PgPool) -> FallbackQueryReconciler<Uuid, Option<ReleaseListing>> {
    let joined = pool.clone();
    let plain = pool.clone();
    FallbackQueryReconciler::new("release")
        .with_strategy(FnStrategy::new(DataSource::Primary, move |id: Uuid| {
            joined_by_id(joined.clone(), id)
        }))
        .with_strategy(FnStrategy::new(DataSource::Simplified, move |id: Uuid| {
            plain_by_id(plain.clone(), id)
        }))
}
