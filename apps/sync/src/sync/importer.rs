//! Per-label catalog import
//!
//! A run searches the catalog for every name the label is known by, fetches
//! each candidate release once, keeps the ones whose reported label matches
//! and writes each kept release (artists, release, tracks) in its own
//! transaction. A release that fails is rolled back and recorded; the run
//! carries on.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use imprint_catalog_client::{
    ArtistRef, CatalogArtist, CatalogRelease, PageRequest, SearchType, TrackAudioFeatures,
    MAX_PAGE_SIZE,
};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::catalog_service::CatalogService;
use super::entity_resolver::EntityResolver;
use super::label_cache::LabelCache;
use super::label_matcher::LabelMatcher;
use crate::error::{SyncError, SyncResult};
use crate::models::{
    ArtistRecord, EntityRecord, ImportRun, ImportStage, ImportSummary, ItemError, Label,
    ReleaseRecord, TrackRecord,
};
use crate::store::{CatalogStore, StoreTransaction};

/// Paging limits for catalog searches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    /// Search page size, clamped to the catalog maximum
    pub page_size: u32,
    /// Pause between search pages
    pub page_delay: Duration,
    /// Pages fetched per search term at most
    pub max_pages: u32,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            page_size: MAX_PAGE_SIZE,
            page_delay: Duration::from_millis(500),
            max_pages: 20,
        }
    }
}

/// Outcome of one label inside [`CatalogImporter::import_all`]
#[derive(Debug)]
pub struct LabelImportOutcome {
    pub label_id: Uuid,
    pub display_name: String,
    pub result: SyncResult<ImportSummary>,
}

/// Running totals for one import run
#[derive(Debug, Default)]
struct RunTally {
    releases: usize,
    artists: HashSet<String>,
    tracks: usize,
    skipped: usize,
    errors: Vec<ItemError>,
}

impl RunTally {
    /// Log a failed release and keep it for the run record
    fn record_error(&mut self, external_id: &str, stage: ImportStage, error: &SyncError) {
        SyncError::partial_import(external_id, stage, error.to_string()).log();
        self.errors.push(ItemError::new(external_id, stage, error));
    }
}

/// What one committed release contributed
struct WrittenRelease {
    artist_external_ids: Vec<String>,
    tracks: usize,
}

/// Release data gathered before the write transaction opens
struct FetchedRelease {
    release: CatalogRelease,
    artists: Vec<CatalogArtist>,
    features: HashMap<String, TrackAudioFeatures>,
}

/// Imports a label's releases from the catalog
pub struct CatalogImporter {
    catalog: Arc<dyn CatalogService>,
    store: Arc<dyn CatalogStore>,
    labels: LabelCache,
    matcher: LabelMatcher,
    resolver: EntityResolver,
    options: ImportOptions,
}

impl CatalogImporter {
    pub fn new(
        catalog: Arc<dyn CatalogService>,
        store: Arc<dyn CatalogStore>,
        labels: LabelCache,
        matcher: LabelMatcher,
    ) -> Self {
        Self {
            catalog,
            store,
            labels,
            matcher,
            resolver: EntityResolver::new(),
            options: ImportOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ImportOptions) -> Self {
        self.options = options;
        self
    }

    /// Import every release of one label
    ///
    /// # Errors
    /// - `SyncError::NotFound` - no label with this id
    /// - `SyncError::CatalogUnauthorized` - the catalog rejected the token
    /// - any error from a search request or the label store
    ///
    /// Failures of individual releases are returned in the summary instead.
    #[instrument(skip(self))]
    pub async fn run(&self, label_id: Uuid) -> SyncResult<ImportSummary> {
        let mut run = ImportRun::new(label_id);
        self.store.create_import_run(&run).await?;
        run.start()?;
        self.store.update_import_run(&run).await?;

        let label = match self.labels.get(label_id).await {
            Ok(Some(label)) => label,
            Ok(None) => {
                let err = SyncError::NotFound(format!("label {}", label_id));
                return Err(self.fail_run(&mut run, err).await);
            }
            Err(e) => return Err(self.fail_run(&mut run, e).await),
        };

        info!(
            label_id = %label.id,
            label = %label.display_name,
            run_id = %run.id,
            "Starting catalog import"
        );

        let mut tally = RunTally::default();
        let outcome = self.import_label(&label, &mut tally).await;
        run.errors = tally.errors.clone();

        match outcome {
            Ok(()) => {
                let summary = ImportSummary {
                    run_id: run.id,
                    label_id: label.id,
                    releases_imported: tally.releases,
                    artists_imported: tally.artists.len(),
                    tracks_imported: tally.tracks,
                    releases_skipped: tally.skipped,
                    errors: tally.errors,
                };
                run.complete(summary.message())?;
                self.store.update_import_run(&run).await?;
                info!(
                    label_id = %label.id,
                    run_id = %run.id,
                    releases = summary.releases_imported,
                    artists = summary.artists_imported,
                    tracks = summary.tracks_imported,
                    skipped = summary.releases_skipped,
                    errors = summary.errors.len(),
                    "Catalog import completed"
                );
                Ok(summary)
            }
            Err(e) => Err(self.fail_run(&mut run, e).await),
        }
    }

    /// Mark the run failed and hand the error back to the caller
    async fn fail_run(&self, run: &mut ImportRun, error: SyncError) -> SyncError {
        error.log();
        if let Err(transition_err) = run.fail(error.to_string()) {
            warn!(run_id = %run.id, error = %transition_err, "Import run already finished");
            return error;
        }
        if let Err(update_err) = self.store.update_import_run(run).await {
            warn!(
                run_id = %run.id,
                error = %update_err,
                "Failed to record import run failure"
            );
        }
        error
    }

    /// Import every label, one after another
    ///
    /// Only a failure to list labels is returned as an error; each label's
    /// own failure is reported in its outcome.
    pub async fn import_all(&self) -> SyncResult<Vec<LabelImportOutcome>> {
        let labels = self.labels.list().await?;
        info!(label_count = labels.len(), "Importing all labels");

        let mut outcomes = Vec::with_capacity(labels.len());
        for label in labels {
            let result = self.run(label.id).await;
            outcomes.push(LabelImportOutcome {
                label_id: label.id,
                display_name: label.display_name,
                result,
            });
        }
        Ok(outcomes)
    }

    async fn import_label(&self, label: &Label, tally: &mut RunTally) -> SyncResult<()> {
        let mut processed = HashSet::new();

        for term in label.search_terms() {
            let query = format!("label:\"{}\"", term);
            let mut page = PageRequest::new(self.options.page_size, 0);

            for page_number in 0..self.options.max_pages {
                if page_number > 0 && !self.options.page_delay.is_zero() {
                    tokio::time::sleep(self.options.page_delay).await;
                }

                let results = self
                    .catalog
                    .search(&query, &[SearchType::Release], page)
                    .await?;
                debug!(
                    query = %query,
                    page = page_number,
                    hits = results.items.len(),
                    total = results.total,
                    "Search page received"
                );

                for candidate in results.releases() {
                    if !processed.insert(candidate.external_id.clone()) {
                        continue;
                    }
                    self.process_release(label, &candidate.external_id, tally)
                        .await?;
                }

                if !results.has_more || results.items.is_empty() {
                    break;
                }
                page = page.next();
            }
        }
        Ok(())
    }

    /// Returns `Err` only for failures that end the run
    async fn process_release(
        &self,
        label: &Label,
        external_id: &str,
        tally: &mut RunTally,
    ) -> SyncResult<()> {
        let release = match self.catalog.get_release(external_id).await {
            Ok(release) => release,
            Err(e) if e.is_run_fatal() => return Err(e),
            Err(e) => {
                tally.record_error(external_id, ImportStage::FetchRelease, &e);
                return Ok(());
            }
        };

        let reported = release.label.as_deref();
        match self.matcher.match_label(reported, label) {
            Some(reason) => {
                debug!(
                    release_id = %external_id,
                    reported = ?reported,
                    reason = ?reason,
                    "Label matched"
                )
            }
            None => {
                debug!(
                    release_id = %external_id,
                    reported = ?reported,
                    label = %label.display_name,
                    "Skipping release from another label"
                );
                tally.skipped += 1;
                return Ok(());
            }
        }

        let fetched = match self.fetch_details(release).await {
            Ok(fetched) => fetched,
            Err((_, e)) if e.is_run_fatal() => return Err(e),
            Err((stage, e)) => {
                tally.record_error(external_id, stage, &e);
                return Ok(());
            }
        };

        let mut tx = match self.store.begin().await {
            Ok(tx) => tx,
            Err(e) => {
                tally.record_error(external_id, ImportStage::BeginTransaction, &e);
                return Ok(());
            }
        };

        match self.write_release(tx.as_mut(), label, &fetched).await {
            Ok(written) => match tx.commit().await {
                Ok(()) => {
                    tally.releases += 1;
                    tally.tracks += written.tracks;
                    tally.artists.extend(written.artist_external_ids);
                    debug!(release_id = %external_id, tracks = written.tracks, "Release committed");
                }
                Err(e) => tally.record_error(external_id, ImportStage::Commit, &e),
            },
            Err((stage, e)) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(release_id = %external_id, error = %rollback_err, "Rollback failed");
                }
                tally.record_error(external_id, stage, &e);
            }
        }
        Ok(())
    }

    /// Fetch artist detail and best-effort audio features for a matched release
    async fn fetch_details(
        &self,
        release: CatalogRelease,
    ) -> Result<FetchedRelease, (ImportStage, SyncError)> {
        let mut artists = Vec::new();
        for artist in release.contributing_artists() {
            let detail = self
                .catalog
                .get_artist(&artist.external_id)
                .await
                .map_err(|e| (ImportStage::FetchArtist, e))?;
            artists.push(detail);
        }

        let track_ids: Vec<String> = release
            .tracks
            .iter()
            .map(|t| t.external_id.clone())
            .collect();
        let features = if track_ids.is_empty() {
            HashMap::new()
        } else {
            match self.catalog.get_audio_features(&track_ids).await {
                Ok(features) => features,
                Err(e) => {
                    warn!(
                        release_id = %release.external_id,
                        error = %e,
                        "Audio features unavailable, importing without them"
                    );
                    HashMap::new()
                }
            }
        };

        Ok(FetchedRelease {
            release,
            artists,
            features,
        })
    }

    async fn write_release(
        &self,
        tx: &mut dyn StoreTransaction,
        label: &Label,
        fetched: &FetchedRelease,
    ) -> Result<WrittenRelease, (ImportStage, SyncError)> {
        let mut artist_ids = HashMap::new();
        for artist in &fetched.artists {
            let record = EntityRecord::Artist(ArtistRecord::from(artist));
            let resolved = self
                .resolver
                .upsert(tx, &record)
                .await
                .map_err(|e| (ImportStage::ResolveArtist, e))?;
            artist_ids.insert(artist.external_id.clone(), resolved.id);
        }

        let release = &fetched.release;
        let release_artist_ids = resolved_artist_ids(&artist_ids, &release.artists)
            .map_err(|e| (ImportStage::ResolveRelease, e))?;
        let record = EntityRecord::Release(ReleaseRecord::from_catalog(
            release,
            label.id,
            release_artist_ids,
        ));
        let release_id = self
            .resolver
            .upsert(tx, &record)
            .await
            .map_err(|e| (ImportStage::ResolveRelease, e))?
            .id;

        for track in &release.tracks {
            let track_artist_ids = resolved_artist_ids(&artist_ids, &track.artists)
                .map_err(|e| (ImportStage::ResolveTrack, e))?;
            let features = fetched
                .features
                .get(&track.external_id)
                .copied()
                .map(Into::into);
            let record = EntityRecord::Track(TrackRecord::from_catalog(
                track,
                release_id,
                track_artist_ids,
                features,
            ));
            self.resolver
                .upsert(tx, &record)
                .await
                .map_err(|e| (ImportStage::ResolveTrack, e))?;
        }

        Ok(WrittenRelease {
            artist_external_ids: artist_ids.into_keys().collect(),
            tracks: release.tracks.len(),
        })
    }
}

fn resolved_artist_ids(
    resolved: &HashMap<String, Uuid>,
    artists: &[ArtistRef],
) -> SyncResult<Vec<Uuid>> {
    artists
        .iter()
        .map(|a| {
            resolved.get(&a.external_id).copied().ok_or_else(|| {
                SyncError::Persistence(format!("artist {} was not resolved", a.external_id))
            })
        })
        .collect()
}

/// Serializable view of an import-all run for CLI output
#[derive(Debug, Serialize)]
pub struct LabelImportReport {
    pub label_id: Uuid,
    pub display_name: String,
    pub summary: Option<ImportSummary>,
    pub error: Option<String>,
}

impl From<&LabelImportOutcome> for LabelImportReport {
    fn from(outcome: &LabelImportOutcome) -> Self {
        let (summary, error) = match &outcome.result {
            Ok(summary) => (Some(summary.clone()), None),
            Err(e) => (None, Some(e.to_string())),
        };
        Self {
            label_id: outcome.label_id,
            display_name: outcome.display_name.clone(),
            summary,
            error,
        }
    }
}
