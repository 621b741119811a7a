//! Batch-run checkpoint
//!
//! Records how far a dependent-resource run got and which batches failed, so
//! the failed batches can be re-run later without repeating the harvest.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::state::{load_json, save_atomic, ResumeError};
use crate::downloader::batch::FailedBatch;

/// Current checkpoint schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Progress of one batch collection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchCheckpoint {
    schema_version: String,
    endpoint: String,
    batch_size: usize,
    total_batches: usize,
    completed_batches: usize,
    records_collected: usize,
    failed_batches: Vec<FailedBatch>,
    created_at: i64,
    updated_at: i64,
}

impl BatchCheckpoint {
    /// Start a checkpoint for a run of `total_batches`
    pub fn new(endpoint: impl Into<String>, batch_size: usize, total_batches: usize) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            schema_version: SCHEMA_VERSION.to_string(),
            endpoint: endpoint.into(),
            batch_size,
            total_batches,
            completed_batches: 0,
            records_collected: 0,
            failed_batches: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the counters and failed-batch list
    pub fn record_progress(
        &mut self,
        completed_batches: usize,
        records_collected: usize,
        failed_batches: &[FailedBatch],
    ) {
        self.completed_batches = completed_batches;
        self.records_collected = records_collected;
        self.failed_batches = failed_batches.to_vec();
        self.updated_at = chrono::Utc::now().timestamp_millis();
    }

    /// Endpoint the batches were fetched from
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Ids per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Batches in the run
    pub fn total_batches(&self) -> usize {
        self.total_batches
    }

    /// Batches processed so far, failed ones included
    pub fn completed_batches(&self) -> usize {
        self.completed_batches
    }

    /// Records fetched so far
    pub fn records_collected(&self) -> usize {
        self.records_collected
    }

    /// Batches given up on
    pub fn failed_batches(&self) -> &[FailedBatch] {
        &self.failed_batches
    }

    /// Last update, Unix millis
    pub fn updated_at(&self) -> i64 {
        self.updated_at
    }

    /// Whether every batch was processed
    pub fn is_finished(&self) -> bool {
        self.completed_batches >= self.total_batches
    }

    /// Atomically write to `path`
    pub fn save(&self, path: &Path) -> Result<(), ResumeError> {
        save_atomic(self, path)?;
        info!(
            path = %path.display(),
            completed = self.completed_batches,
            total = self.total_batches,
            failed = self.failed_batches.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    /// Load from `path`, rejecting unknown schema versions
    pub fn load(path: &Path) -> Result<Self, ResumeError> {
        let checkpoint: Self = load_json(path)?;
        if checkpoint.schema_version != SCHEMA_VERSION {
            warn!(
                found_version = %checkpoint.schema_version,
                expected_version = SCHEMA_VERSION,
                "Checkpoint schema version mismatch"
            );
            return Err(ResumeError::SchemaVersionMismatch {
                expected: SCHEMA_VERSION.to_string(),
                found: checkpoint.schema_version,
            });
        }
        Ok(checkpoint)
    }
}
