//! Batch classification of untagged tracks
//!
//! Loads tracks that have no taxonomy yet, runs them through the
//! classification engine and writes the winning taxonomy and confidence back.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::timeout;

use crate::classify::{ClassificationEngine, TrackMetadata};
use crate::error::{SyncError, SyncResult};
use crate::store::CatalogStore;

/// Job-level timeout for one batch (10 minutes)
const JOB_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Classification job payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyUntaggedJob {
    /// Tracks examined per run at most
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

impl Default for ClassifyUntaggedJob {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClassifyReport {
    pub examined: usize,
    pub classified: usize,
    /// Tracks assigned per taxonomy key
    pub by_taxonomy: BTreeMap<String, usize>,
    /// Tracks whose classification could not be stored
    pub failures: usize,
}

/// Execute the classification job
pub async fn execute(
    store: &dyn CatalogStore,
    engine: &ClassificationEngine,
    job: &ClassifyUntaggedJob,
) -> SyncResult<ClassifyReport> {
    if job.batch_size == 0 {
        return Err(SyncError::Validation(
            "batch size must be at least 1".to_string(),
        ));
    }

    tracing::info!(batch_size = job.batch_size, "Classifying untagged tracks");

    match timeout(
        Duration::from_secs(JOB_TIMEOUT_SECS),
        execute_inner(store, engine, job.batch_size),
    )
    .await
    {
        Ok(result) => result,
        Err(_) => {
            tracing::error!(timeout_secs = JOB_TIMEOUT_SECS, "Classification job timed out");
            Err(SyncError::Internal(format!(
                "classification timed out after {}s",
                JOB_TIMEOUT_SECS
            )))
        }
    }
}

async fn execute_inner(
    store: &dyn CatalogStore,
    engine: &ClassificationEngine,
    batch_size: usize,
) -> SyncResult<ClassifyReport> {
    let tracks = store.untagged_tracks(batch_size).await?;
    let mut report = ClassifyReport {
        examined: tracks.len(),
        ..Default::default()
    };

    for track in &tracks {
        let result = engine.classify(
            track.genres.iter().map(String::as_str),
            track.audio_features.as_ref(),
            &TrackMetadata {
                explicit: track.explicit,
            },
        )?;

        tracing::debug!(
            track_id = %track.id,
            taxonomy = %result.label,
            confidence = result.confidence,
            "Track classified"
        );

        match store
            .assign_classification(track.id, &result.label, result.confidence)
            .await
        {
            Ok(()) => {
                report.classified += 1;
                *report.by_taxonomy.entry(result.label).or_insert(0) += 1;
            }
            Err(e) => {
                tracing::warn!(track_id = %track.id, error = %e, "Failed to store classification");
                report.failures += 1;
            }
        }
    }

    tracing::info!(
        examined = report.examined,
        classified = report.classified,
        failures = report.failures,
        "Classification batch finished"
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_zero_batch_rejected() {
        let store = MemoryStore::new();
        let result = execute(
            &store,
            &ClassificationEngine::builtin(),
            &ClassifyUntaggedJob { batch_size: 0 },
        )
        .await;
        assert_matches!(result, Err(SyncError::Validation(_)));
    }

    #[tokio::test]
    async fn test_empty_store_reports_nothing() {
        let store = MemoryStore::new();
        let report = execute(
            &store,
            &ClassificationEngine::builtin(),
            &ClassifyUntaggedJob::default(),
        )
        .await
        .unwrap();
        assert_eq!(report, ClassifyReport::default());
    }

    #[test]
    fn test_payload_defaults() {
        let job: ClassifyUntaggedJob = serde_json::from_str("{}").unwrap();
        assert_eq!(job.batch_size, DEFAULT_BATCH_SIZE);
    }
}
