//! PostgreSQL stores
//!
//! Expected tables (migrations live with the schema owner):
//!
//! - `labels (id, display_name, variants text[])`
//! - `artists`, `releases`, `tracks`, each with a unique `external_id`
//! - `release_artists (release_id, artist_id)`, `track_artists (track_id, artist_id)`
//! - `tracks.audio_features jsonb`, `tracks.classification`, `tracks.classification_confidence`
//! - `import_runs (id, label_id, status, started_at, completed_at, message, errors jsonb)`

use std::time::Duration;

use async_trait::async_trait;
use imprint_shared_config::DatabaseConfig;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use tracing::debug;
use uuid::Uuid;

use super::{CatalogStore, LabelStore, StoreTransaction};
use crate::error::{SyncError, SyncResult};
use crate::models::{AudioFeatures, EntityKind, EntityRecord, ImportRun, Label, UntaggedTrack};

/// Open a connection pool from shared database settings
pub async fn connect(config: &DatabaseConfig) -> SyncResult<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.idle_timeout_secs))
        .connect(&config.url)
        .await?;
    Ok(pool)
}

fn table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Artist => "artists",
        EntityKind::Release => "releases",
        EntityKind::Track => "tracks",
    }
}

/// Label store over the `labels` table
#[derive(Clone)]
pub struct PgLabelStore {
    pool: PgPool,
}

impl PgLabelStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LabelStore for PgLabelStore {
    async fn get_label(&self, id: Uuid) -> SyncResult<Option<Label>> {
        let label = sqlx::query_as::<_, Label>(
            "SELECT id, display_name, variants FROM labels WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(label)
    }

    async fn list_labels(&self) -> SyncResult<Vec<Label>> {
        let labels = sqlx::query_as::<_, Label>(
            "SELECT id, display_name, variants FROM labels ORDER BY display_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(labels)
    }
}

/// Catalog store over the catalog tables
#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn begin(&self) -> SyncResult<Box<dyn StoreTransaction>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgStoreTransaction { tx }))
    }

    async fn create_import_run(&self, run: &ImportRun) -> SyncResult<()> {
        sqlx::query(
            r#"
            INSERT INTO import_runs (id, label_id, status, started_at, completed_at, message, errors)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(run.id)
        .bind(run.label_id)
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.message.as_deref())
        .bind(Json(&run.errors))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_import_run(&self, run: &ImportRun) -> SyncResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE import_runs SET
                status = $2,
                started_at = $3,
                completed_at = $4,
                message = $5,
                errors = $6
            WHERE id = $1
            "#,
        )
        .bind(run.id)
        .bind(run.status.as_str())
        .bind(run.started_at)
        .bind(run.completed_at)
        .bind(run.message.as_deref())
        .bind(Json(&run.errors))
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!("import run {}", run.id)));
        }
        Ok(())
    }

    async fn untagged_tracks(&self, limit: usize) -> SyncResult<Vec<UntaggedTrack>> {
        let rows = sqlx::query(
            r#"
            SELECT
                t.id,
                t.external_id,
                t.title,
                t.explicit,
                t.audio_features,
                ARRAY(
                    SELECT DISTINCT g
                    FROM track_artists ta
                    JOIN artists a ON a.id = ta.artist_id
                    CROSS JOIN LATERAL unnest(a.genres) AS g
                    WHERE ta.track_id = t.id
                    ORDER BY g
                ) AS genres
            FROM tracks t
            WHERE t.classification IS NULL
            ORDER BY t.created_at ASC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| -> SyncResult<UntaggedTrack> {
                let features: Option<Json<AudioFeatures>> = row.try_get("audio_features")?;
                Ok(UntaggedTrack {
                    id: row.try_get("id")?,
                    external_id: row.try_get("external_id")?,
                    title: row.try_get("title")?,
                    explicit: row.try_get("explicit")?,
                    genres: row.try_get("genres")?,
                    audio_features: features.map(|f| f.0),
                })
            })
            .collect()
    }

    async fn assign_classification(
        &self,
        track_id: Uuid,
        taxonomy: &str,
        confidence: f64,
    ) -> SyncResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tracks SET
                classification = $2,
                classification_confidence = $3,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(track_id)
        .bind(taxonomy)
        .bind(confidence)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!("track {}", track_id)));
        }
        Ok(())
    }
}

struct PgStoreTransaction {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl StoreTransaction for PgStoreTransaction {
    async fn find_id(&mut self, kind: EntityKind, external_id: &str) -> SyncResult<Option<Uuid>> {
        let sql = format!("SELECT id FROM {} WHERE external_id = $1", table(kind));
        let row = sqlx::query(&sql)
            .bind(external_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(|r| r.try_get::<Uuid, _>("id")).transpose()?)
    }

    async fn exists(&mut self, kind: EntityKind, id: Uuid) -> SyncResult<bool> {
        let sql = format!(
            "SELECT EXISTS(SELECT 1 FROM {} WHERE id = $1) AS present",
            table(kind)
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(row.try_get("present")?)
    }

    async fn insert(&mut self, id: Uuid, record: &EntityRecord) -> SyncResult<()> {
        match record {
            EntityRecord::Artist(a) => {
                sqlx::query(
                    r#"
                    INSERT INTO artists
                        (id, external_id, name, image_urls, genres, popularity, followers, external_url)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    "#,
                )
                .bind(id)
                .bind(&a.external_id)
                .bind(&a.name)
                .bind(&a.image_urls)
                .bind(&a.genres)
                .bind(a.popularity)
                .bind(a.followers)
                .bind(a.external_url.as_deref())
                .execute(&mut *self.tx)
                .await?;
            }
            EntityRecord::Release(r) => {
                sqlx::query(
                    r#"
                    INSERT INTO releases
                        (id, external_id, title, release_date, total_tracks, artwork_url,
                         label_id, external_url, release_type, popularity)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                    "#,
                )
                .bind(id)
                .bind(&r.external_id)
                .bind(&r.title)
                .bind(r.release_date.as_deref())
                .bind(r.total_tracks)
                .bind(r.artwork_url.as_deref())
                .bind(r.label_id)
                .bind(r.external_url.as_deref())
                .bind(&r.release_type)
                .bind(r.popularity)
                .execute(&mut *self.tx)
                .await?;
            }
            EntityRecord::Track(t) => {
                sqlx::query(
                    r#"
                    INSERT INTO tracks
                        (id, external_id, title, duration_ms, track_number, disc_number,
                         explicit, release_id, audio_features)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                    "#,
                )
                .bind(id)
                .bind(&t.external_id)
                .bind(&t.title)
                .bind(t.duration_ms)
                .bind(t.track_number)
                .bind(t.disc_number)
                .bind(t.explicit)
                .bind(t.release_id)
                .bind(t.audio_features.map(Json))
                .execute(&mut *self.tx)
                .await?;
            }
        }
        debug!(kind = %record.kind(), external_id = %record.external_id(), %id, "Inserted row");
        Ok(())
    }

    async fn update(&mut self, id: Uuid, record: &EntityRecord) -> SyncResult<()> {
        let result = match record {
            EntityRecord::Artist(a) => {
                sqlx::query(
                    r#"
                    UPDATE artists SET
                        name = $2,
                        image_urls = CASE WHEN cardinality($3::text[]) > 0 THEN $3 ELSE image_urls END,
                        genres = $4,
                        popularity = COALESCE($5, popularity),
                        followers = COALESCE($6, followers),
                        external_url = COALESCE($7, external_url),
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&a.name)
                .bind(&a.image_urls)
                .bind(&a.genres)
                .bind(a.popularity)
                .bind(a.followers)
                .bind(a.external_url.as_deref())
                .execute(&mut *self.tx)
                .await?
            }
            EntityRecord::Release(r) => {
                sqlx::query(
                    r#"
                    UPDATE releases SET
                        title = $2,
                        release_date = COALESCE($3, release_date),
                        total_tracks = $4,
                        artwork_url = COALESCE($5, artwork_url),
                        external_url = COALESCE($6, external_url),
                        release_type = $7,
                        popularity = COALESCE($8, popularity),
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&r.title)
                .bind(r.release_date.as_deref())
                .bind(r.total_tracks)
                .bind(r.artwork_url.as_deref())
                .bind(r.external_url.as_deref())
                .bind(&r.release_type)
                .bind(r.popularity)
                .execute(&mut *self.tx)
                .await?
            }
            EntityRecord::Track(t) => {
                sqlx::query(
                    r#"
                    UPDATE tracks SET
                        title = $2,
                        duration_ms = $3,
                        track_number = $4,
                        disc_number = $5,
                        explicit = $6,
                        audio_features = COALESCE($7, audio_features),
                        updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&t.title)
                .bind(t.duration_ms)
                .bind(t.track_number)
                .bind(t.disc_number)
                .bind(t.explicit)
                .bind(t.audio_features.map(Json))
                .execute(&mut *self.tx)
                .await?
            }
        };

        if result.rows_affected() == 0 {
            return Err(SyncError::NotFound(format!("{} {}", record.kind(), id)));
        }
        Ok(())
    }

    async fn link_artists(
        &mut self,
        kind: EntityKind,
        id: Uuid,
        artist_ids: &[Uuid],
    ) -> SyncResult<()> {
        let sql = match kind {
            EntityKind::Release => {
                r#"
                INSERT INTO release_artists (release_id, artist_id)
                SELECT $1, artist_id FROM unnest($2::uuid[]) AS artist_id
                ON CONFLICT DO NOTHING
                "#
            }
            EntityKind::Track => {
                r#"
                INSERT INTO track_artists (track_id, artist_id)
                SELECT $1, artist_id FROM unnest($2::uuid[]) AS artist_id
                ON CONFLICT DO NOTHING
                "#
            }
            EntityKind::Artist => {
                return Err(SyncError::Validation(
                    "artists cannot be linked to artists".to_string(),
                ))
            }
        };

        sqlx::query(sql)
            .bind(id)
            .bind(artist_ids)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> SyncResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> SyncResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
