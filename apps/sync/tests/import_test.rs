//! Integration tests for catalog import runs
//!
//! Runs the importer against the in-memory catalog and store to check
//! idempotence, per-release failure isolation and run bookkeeping.

mod common;

use assert_matches::assert_matches;
use common::{
    catalog_artist, catalog_release, deep_features, deep_track_features, fast_options, Failure,
    Harness,
};
use imprint_sync::models::{ImportStage, ImportStatus, Label};
use imprint_sync::sync::{ImportOptions, LabelAliasTable};
use imprint_sync::SyncError;
use tokio::time::{Duration, Instant};
use uuid::Uuid;

const DEEP: &str = "Build It Deep";

fn deep_label() -> Label {
    Label::new(DEEP, vec![])
}

fn publish_many(harness: &Harness, label_name: &str, count: usize) {
    for n in 1..=count {
        harness.catalog.publish(
            label_name,
            catalog_release(&format!("r{}", n), &format!("Release {}", n), Some(label_name)),
        );
    }
}

// ============================================================================
// Idempotence
// ============================================================================

#[tokio::test]
async fn test_second_run_adds_no_rows() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    publish_many(&harness, DEEP, 3);

    let first = harness.importer.run(label.id).await.unwrap();
    assert_eq!(first.releases_imported, 3);
    assert_eq!(first.artists_imported, 3);
    assert_eq!(first.tracks_imported, 6);
    assert!(first.errors.is_empty());

    let release_id = harness.store.release_by_external_id("r1").await.unwrap().id;

    let second = harness.importer.run(label.id).await.unwrap();
    assert!(second.errors.is_empty());
    assert_eq!(harness.store.release_count().await, 3);
    assert_eq!(harness.store.artist_count().await, 3);
    assert_eq!(harness.store.track_count().await, 6);
    assert_eq!(
        harness.store.release_by_external_id("r1").await.unwrap().id,
        release_id
    );
}

#[tokio::test]
async fn test_rerun_updates_display_fields() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts", Some(DEEP)));
    harness.importer.run(label.id).await.unwrap();

    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts (Remastered)", Some(DEEP)));
    harness.importer.run(label.id).await.unwrap();

    let release = harness.store.release_by_external_id("r1").await.unwrap();
    assert_eq!(release.title, "Deep Cuts (Remastered)");
    assert_eq!(release.label_id, label.id);
    assert_eq!(harness.store.release_count().await, 1);
}

// ============================================================================
// Partial failure
// ============================================================================

#[tokio::test]
async fn test_one_failing_release_does_not_stop_the_run() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    publish_many(&harness, DEEP, 5);
    harness.store.fail_on_external_id("r3").await;

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_imported, 4);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].external_id, "r3");
    assert_eq!(summary.errors[0].stage, ImportStage::ResolveRelease);
    assert_eq!(harness.store.release_count().await, 4);
    assert!(harness.store.release_by_external_id("r3").await.is_none());
    // the failed release's artist was written in the same transaction
    assert!(harness.store.artist_by_external_id("r3-artist").await.is_none());
    assert_eq!(harness.store.rollback_count(), 1);
}

#[tokio::test]
async fn test_artist_fetch_failure_is_item_error() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    publish_many(&harness, DEEP, 2);
    harness.catalog.fail("r2-artist", Failure::Unavailable);

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_imported, 1);
    assert_eq!(summary.errors.len(), 1);
    assert_eq!(summary.errors[0].stage, ImportStage::FetchArtist);
    assert!(harness.store.release_by_external_id("r2").await.is_none());
}

#[tokio::test]
async fn test_missing_release_is_item_error() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    publish_many(&harness, DEEP, 2);
    harness.catalog.fail("r1", Failure::Missing);

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_imported, 1);
    assert_eq!(summary.errors[0].external_id, "r1");
    assert_eq!(summary.errors[0].stage, ImportStage::FetchRelease);
}

// ============================================================================
// Label matching
// ============================================================================

#[tokio::test]
async fn test_release_from_other_label_skipped() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts", Some("Build-It Deep Ltd")));
    harness
        .catalog
        .publish(DEEP, catalog_release("r2", "Wrong Shelf", Some("Tech House Records")));
    harness
        .catalog
        .publish(DEEP, catalog_release("r3", "No Label", None));

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_imported, 1);
    assert_eq!(summary.releases_skipped, 2);
    assert!(summary.errors.is_empty());
    assert!(harness.store.release_by_external_id("r2").await.is_none());
}

#[tokio::test]
async fn test_other_label_skipped_before_artist_lookup() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts", Some(DEEP)));
    harness
        .catalog
        .publish(DEEP, catalog_release("r2", "Wrong Shelf", Some("Tech House Records")));
    harness.catalog.fail("r2-artist", Failure::Unavailable);

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_imported, 1);
    assert_eq!(summary.releases_skipped, 1);
    assert!(summary.errors.is_empty());
}

#[tokio::test]
async fn test_other_label_artist_unauthorized_does_not_fail_run() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts", Some(DEEP)));
    harness
        .catalog
        .publish(DEEP, catalog_release("r2", "Wrong Shelf", Some("Tech House Records")));
    harness.catalog.fail("r2-artist", Failure::Unauthorized);

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_skipped, 1);
    let run = harness.store.import_run(summary.run_id).await.unwrap();
    assert_eq!(run.status, ImportStatus::Completed);
}

#[tokio::test]
async fn test_variants_searched_once_per_release() {
    let label = Label::new("Build It Records", vec!["BIR Music".to_string()]);
    let harness = Harness::new(vec![label.clone()]);
    let release = catalog_release("r1", "Disco Nights", Some("BIR Music"));
    harness.catalog.publish("Build It Records", release.clone());
    harness.catalog.publish("BIR Music", release);

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_imported, 1);
    assert_eq!(harness.catalog.search_calls(), 2);
    assert_eq!(harness.catalog.release_calls(), 1);
}

#[tokio::test]
async fn test_alias_table_matches_unrelated_spelling() {
    let label = deep_label();
    let mut aliases = LabelAliasTable::new();
    aliases.insert("Imprint Holdings", label.id).unwrap();
    let harness = Harness::with_aliases(vec![label.clone()], aliases);
    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts", Some("Imprint Holdings")));

    let summary = harness.importer.run(label.id).await.unwrap();
    assert_eq!(summary.releases_imported, 1);
}

// ============================================================================
// Paging and enrichment
// ============================================================================

#[tokio::test]
async fn test_pages_until_exhausted() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    publish_many(&harness, DEEP, 5);

    let summary = harness.importer.run(label.id).await.unwrap();

    assert_eq!(summary.releases_imported, 5);
    // page size 2: offsets 0, 2, 4
    assert_eq!(harness.catalog.search_calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_pause_between_search_pages() {
    let label = deep_label();
    let delay = Duration::from_millis(750);
    let harness = Harness::new(vec![label.clone()]).with_options(ImportOptions {
        page_delay: delay,
        ..fast_options(2)
    });
    publish_many(&harness, DEEP, 5);

    let started = Instant::now();
    let summary = harness.importer.run(label.id).await.unwrap();
    let elapsed = started.elapsed();

    assert_eq!(summary.releases_imported, 5);
    assert_eq!(harness.catalog.search_calls(), 3);
    // two pauses for three pages, none before the first
    assert!(elapsed >= delay * 2, "elapsed {:?}", elapsed);
    assert!(elapsed < delay * 3, "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_audio_features_and_artist_genres_stored() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    harness
        .catalog
        .add_artist(catalog_artist("r1-artist", &["minimal", "deep-house"]));
    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts", Some(DEEP)));
    harness.catalog.set_features("r1-t1", deep_track_features());

    harness.importer.run(label.id).await.unwrap();

    let with = harness.store.track_by_external_id("r1-t1").await.unwrap();
    let without = harness.store.track_by_external_id("r1-t2").await.unwrap();
    assert_eq!(with.audio_features, Some(deep_features()));
    assert_eq!(without.audio_features, None);
    assert_eq!(
        harness.store.artist_by_external_id("r1-artist").await.unwrap().genres,
        vec!["minimal".to_string(), "deep-house".to_string()]
    );
}

// ============================================================================
// Fatal errors and bookkeeping
// ============================================================================

#[tokio::test]
async fn test_unknown_label_is_not_found() {
    let harness = Harness::new(vec![]);
    let label_id = Uuid::new_v4();
    let result = harness.importer.run(label_id).await;
    assert_matches!(result, Err(SyncError::NotFound(_)));

    let runs = harness.store.import_runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].label_id, label_id);
    assert_eq!(runs[0].status, ImportStatus::Failed);
    assert_eq!(harness.catalog.search_calls(), 0);
}

#[tokio::test]
async fn test_unauthorized_catalog_fails_run() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    publish_many(&harness, DEEP, 3);
    harness.catalog.fail("r2", Failure::Unauthorized);

    let result = harness.importer.run(label.id).await;
    assert_matches!(result, Err(SyncError::CatalogUnauthorized(_)));

    let runs = harness.store.import_runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ImportStatus::Failed);
    assert!(runs[0].message.as_deref().unwrap_or_default().contains("unauthorized"));
    // releases committed before the failure stay
    assert_eq!(harness.store.release_count().await, 1);
}

#[tokio::test]
async fn test_search_failure_fails_run() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    harness.catalog.fail_search(Failure::Unavailable);

    let result = harness.importer.run(label.id).await;
    assert_matches!(result, Err(SyncError::ExternalService { .. }));
    assert_eq!(
        harness.store.import_runs().await[0].status,
        ImportStatus::Failed
    );
}

#[tokio::test]
async fn test_label_store_unavailable_fails_run() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    harness.labels.set_unavailable(true);

    let result = harness.importer.run(label.id).await;
    assert_matches!(result, Err(SyncError::Database(_)));

    let runs = harness.store.import_runs().await;
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].status, ImportStatus::Failed);
    assert!(runs[0].message.as_deref().unwrap_or_default().contains("database error"));
    assert!(runs[0].completed_at.is_some());
    assert_eq!(harness.catalog.search_calls(), 0);
}

#[tokio::test]
async fn test_completed_run_recorded() {
    let label = deep_label();
    let harness = Harness::new(vec![label.clone()]);
    publish_many(&harness, DEEP, 2);
    harness.store.fail_on_external_id("r2-t1").await;

    let summary = harness.importer.run(label.id).await.unwrap();
    let run = harness.store.import_run(summary.run_id).await.unwrap();

    assert_eq!(run.status, ImportStatus::Completed);
    assert_eq!(run.label_id, label.id);
    assert!(run.started_at.is_some());
    assert!(run.completed_at.is_some());
    assert_eq!(run.message.as_deref(), Some(summary.message().as_str()));
    assert_eq!(run.errors, summary.errors);
    assert_eq!(run.errors[0].stage, ImportStage::ResolveTrack);
}

// ============================================================================
// Import all
// ============================================================================

#[tokio::test]
async fn test_import_all_runs_every_label() {
    let deep = deep_label();
    let tech = Label::new("Build It Tech", vec![]);
    let harness = Harness::new(vec![deep.clone(), tech.clone()]);
    publish_many(&harness, DEEP, 2);
    harness
        .catalog
        .publish("Build It Tech", catalog_release("t1", "Warehouse", Some("Build It Tech")));

    let outcomes = harness.importer.import_all().await.unwrap();

    assert_eq!(outcomes.len(), 2);
    let deep_outcome = outcomes.iter().find(|o| o.label_id == deep.id).unwrap();
    let tech_outcome = outcomes.iter().find(|o| o.label_id == tech.id).unwrap();
    assert_eq!(deep_outcome.result.as_ref().unwrap().releases_imported, 2);
    assert_eq!(tech_outcome.result.as_ref().unwrap().releases_imported, 1);
    assert_eq!(harness.store.import_runs().await.len(), 2);
}

#[tokio::test]
async fn test_import_all_keeps_going_after_label_failure() {
    let deep = deep_label();
    let tech = Label::new("Build It Tech", vec![]);
    let harness = Harness::new(vec![deep.clone(), tech.clone()]);
    harness
        .catalog
        .publish(DEEP, catalog_release("r1", "Deep Cuts", Some(DEEP)));
    harness
        .catalog
        .publish("Build It Tech", catalog_release("t1", "Warehouse", Some("Build It Tech")));
    harness.catalog.fail("t1", Failure::Unauthorized);

    let outcomes = harness.importer.import_all().await.unwrap();

    let tech_outcome = outcomes.iter().find(|o| o.label_id == tech.id).unwrap();
    let deep_outcome = outcomes.iter().find(|o| o.label_id == deep.id).unwrap();
    assert_matches!(tech_outcome.result, Err(SyncError::CatalogUnauthorized(_)));
    assert!(deep_outcome.result.is_ok());
}
