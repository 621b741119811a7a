//! Collection configuration constants

use std::path::PathBuf;
use std::time::Duration;

use crate::downloader::CollectError;

/// Report ids per batch request.
/// Keeps the `in.(...)` filter well under common URL length limits.
pub const DEFAULT_BATCH_SIZE: usize = 250;

/// Attempts per batch before it is recorded as failed
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Delay before the second attempt of a batch; doubles per attempt
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(5);

/// Pause between consecutive batches
pub const BATCH_DELAY: Duration = Duration::from_millis(500);

/// Save the batch checkpoint every N batches
pub const CHECKPOINT_INTERVAL_BATCHES: usize = 100;

/// Exponential backoff: `base * 2^retry`
///
/// `retry` is zero-based, so with a 5s base the waits are 5s, 10s, 20s, ...
pub fn calculate_backoff(base: Duration, retry: u32) -> Duration {
    base.saturating_mul(2u32.saturating_pow(retry))
}

/// Tunables for [`crate::downloader::BatchCollector`]
#[derive(Debug, Clone, PartialEq)]
pub struct BatchConfig {
    batch_size: usize,
    max_attempts: u32,
    initial_backoff: Duration,
    batch_delay: Duration,
    checkpoint_interval: usize,
    checkpoint_path: Option<PathBuf>,
}

impl BatchConfig {
    /// Defaults: 250 ids, 3 attempts, 5s backoff, 0.5s pacing, no checkpoint
    pub fn new() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_backoff: INITIAL_BACKOFF,
            batch_delay: BATCH_DELAY,
            checkpoint_interval: CHECKPOINT_INTERVAL_BATCHES,
            checkpoint_path: None,
        }
    }

    /// Set ids per batch
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set attempts per batch
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    /// Set the first retry delay
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Set the pause between batches
    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    /// Set how often (in batches) the checkpoint is saved
    pub fn with_checkpoint_interval(mut self, interval: usize) -> Self {
        self.checkpoint_interval = interval;
        self
    }

    /// Persist progress to `path` during the run
    pub fn with_checkpoint_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    /// Reject settings the batch loop cannot run with
    pub fn validate(&self) -> Result<(), CollectError> {
        if self.batch_size == 0 {
            return Err(CollectError::InvalidArgument(
                "batch size must be at least 1".to_string(),
            ));
        }
        if self.max_attempts == 0 {
            return Err(CollectError::InvalidArgument(
                "max attempts must be at least 1".to_string(),
            ));
        }
        if self.checkpoint_interval == 0 {
            return Err(CollectError::InvalidArgument(
                "checkpoint interval must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Ids per batch
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Attempts per batch
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// First retry delay
    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// Pause between batches
    pub fn batch_delay(&self) -> Duration {
        self.batch_delay
    }

    /// Batches between checkpoint saves
    pub fn checkpoint_interval(&self) -> usize {
        self.checkpoint_interval
    }

    /// Checkpoint file, if any
    pub fn checkpoint_path(&self) -> Option<&PathBuf> {
        self.checkpoint_path.as_ref()
    }

    /// Backoff before attempt `attempt + 1`, where `attempt` is 1-based
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        calculate_backoff(self.initial_backoff, attempt.saturating_sub(1))
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::new()
    }
}
