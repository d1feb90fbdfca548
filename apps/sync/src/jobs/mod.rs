//! Batch jobs run from the CLI

pub mod classify_untagged;

pub use classify_untagged::{ClassifyReport, ClassifyUntaggedJob, DEFAULT_BATCH_SIZE};
