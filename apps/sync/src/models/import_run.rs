//! Import run bookkeeping
//!
//! A run moves `pending -> running -> completed | failed` and never back.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{SyncError, SyncResult};

/// Import run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Whether the lifecycle allows moving to `next`
    pub fn can_transition_to(&self, next: ImportStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Running)
                | (Self::Running, Self::Completed)
                | (Self::Running, Self::Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl fmt::Display for ImportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ImportStatus {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(SyncError::Validation(format!(
                "unknown import status: {}",
                other
            ))),
        }
    }
}

/// Step of release processing an item error happened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStage {
    FetchRelease,
    FetchArtist,
    BeginTransaction,
    ResolveArtist,
    ResolveRelease,
    ResolveTrack,
    Commit,
}

impl ImportStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FetchRelease => "fetch_release",
            Self::FetchArtist => "fetch_artist",
            Self::BeginTransaction => "begin_transaction",
            Self::ResolveArtist => "resolve_artist",
            Self::ResolveRelease => "resolve_release",
            Self::ResolveTrack => "resolve_track",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for ImportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A release that failed without failing the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    pub external_id: String,
    pub stage: ImportStage,
    pub message: String,
}

impl ItemError {
    pub fn new(external_id: impl Into<String>, stage: ImportStage, error: &SyncError) -> Self {
        Self {
            external_id: external_id.into(),
            stage,
            message: error.to_string(),
        }
    }
}

/// Import run row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportRun {
    pub id: Uuid,
    pub label_id: Uuid,
    pub status: ImportStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub message: Option<String>,
    pub errors: Vec<ItemError>,
}

impl ImportRun {
    /// New pending run for a label
    pub fn new(label_id: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            label_id,
            status: ImportStatus::Pending,
            started_at: None,
            completed_at: None,
            message: None,
            errors: Vec::new(),
        }
    }

    fn transition(&mut self, next: ImportStatus) -> SyncResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(SyncError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// `pending -> running`
    pub fn start(&mut self) -> SyncResult<()> {
        self.transition(ImportStatus::Running)?;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// `running -> completed`
    pub fn complete(&mut self, message: impl Into<String>) -> SyncResult<()> {
        self.transition(ImportStatus::Completed)?;
        self.completed_at = Some(Utc::now());
        self.message = Some(message.into());
        Ok(())
    }

    /// `running -> failed`
    pub fn fail(&mut self, message: impl Into<String>) -> SyncResult<()> {
        self.transition(ImportStatus::Failed)?;
        self.completed_at = Some(Utc::now());
        self.message = Some(message.into());
        Ok(())
    }
}

/// Outcome of one label import
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportSummary {
    pub run_id: Uuid,
    pub label_id: Uuid,
    /// Releases committed in this run
    pub releases_imported: usize,
    /// Distinct artists resolved in committed releases
    pub artists_imported: usize,
    /// Tracks committed in this run
    pub tracks_imported: usize,
    /// Candidates whose label did not match
    pub releases_skipped: usize,
    pub errors: Vec<ItemError>,
}

impl ImportSummary {
    /// One-line summary stored as the run message
    pub fn message(&self) -> String {
        format!(
            "imported {} releases, {} artists, {} tracks; skipped {}; {} item errors",
            self.releases_imported,
            self.artists_imported,
            self.tracks_imported,
            self.releases_skipped,
            self.errors.len()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_run_lifecycle() {
        let mut run = ImportRun::new(Uuid::new_v4());
        assert_eq!(run.status, ImportStatus::Pending);

        run.start().unwrap();
        assert_eq!(run.status, ImportStatus::Running);
        assert!(run.started_at.is_some());

        run.complete("done").unwrap();
        assert_eq!(run.status, ImportStatus::Completed);
        assert!(run.completed_at.is_some());
        assert_eq!(run.message.as_deref(), Some("done"));
    }

    #[test]
    fn test_run_rejects_backwards_and_skipping_moves() {
        let mut run = ImportRun::new(Uuid::new_v4());
        assert_matches!(
            run.complete("too early"),
            Err(SyncError::InvalidTransition {
                from: ImportStatus::Pending,
                to: ImportStatus::Completed
            })
        );
        assert_matches!(run.fail("too early"), Err(SyncError::InvalidTransition { .. }));

        run.start().unwrap();
        run.fail("catalog unauthorized").unwrap();
        assert_matches!(run.start(), Err(SyncError::InvalidTransition { .. }));
        assert_eq!(run.status, ImportStatus::Failed);
    }

    #[test]
    fn test_status_round_trips_through_text() {
        for status in [
            ImportStatus::Pending,
            ImportStatus::Running,
            ImportStatus::Completed,
            ImportStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ImportStatus>().unwrap(), status);
        }
        assert!("cancelled".parse::<ImportStatus>().is_err());
    }

    #[test]
    fn test_item_error_serializes_stage() {
        let err = SyncError::Persistence("release missing".to_string());
        let item = ItemError::new("t1", ImportStage::ResolveTrack, &err);
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["stage"], "resolve_track");
        assert_eq!(json["external_id"], "t1");
    }
}
