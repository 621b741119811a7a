//! Collection orchestration
//!
//! Collectors drive the request executor across many partitioned requests
//! and keep going when individual requests fail.
//!
//! # Overview
//!
//! 1. **Sweep**: [`exhaustive::ExhaustiveCollector`] reads a whole table one
//!    (year, jurisdiction) pair at a time so no response hits the row cap
//! 2. **Harvest**: [`batch::BatchCollector`] sweeps `general` for report ids
//!    and deduplicates them
//! 3. **Batch**: the ids are partitioned into bounded `in.(...)` filters and
//!    fetched with per-batch retry, pacing and checkpointing
//! 4. **Report**: failed partitions and failed batches are returned alongside
//!    the records so nothing is dropped silently
//!
//! # Quick Start
//!
//! ```no_run
//! use fac_collector::downloader::{BatchCollector, BatchConfig};
//! use fac_collector::fetcher::fac_config::ClientConfig;
//! use fac_collector::fetcher::fac_http::FacHttpClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(FacHttpClient::from_config(ClientConfig::from_env()?)?);
//! let config = BatchConfig::new().with_checkpoint_path("./awards.checkpoint.json");
//!
//! let report = BatchCollector::new(client, config)?
//!     .collect("federal_awards")
//!     .await?;
//! println!("{} awards, {} failed batches", report.records.len(), report.failed_batches.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! Collectors return `Result<T, CollectError>` only for run-level failures:
//! bad arguments, an unusable harvest, or a cancelled harvest. Per-request
//! failures are reported inside the returned report.

pub mod batch;
pub mod config;
pub mod exhaustive;
pub mod progress;
pub mod rate_limit;
pub mod sleep;

pub use batch::{Batch, BatchCollector, BatchReport, FailedBatch};
pub use config::BatchConfig;
pub use exhaustive::{ExhaustiveCollector, FailedPartition, SweepReport};
pub use progress::{LogProgress, ProgressReporter, WorkUnit};
pub use rate_limit::{RateLimitPolicy, RetryLimit};
pub use sleep::{Pause, Sleeper, TokioSleeper};

use crate::fetcher::FetcherError;
use crate::resume::ResumeError;

/// Run-level collection errors
#[derive(Debug, thiserror::Error)]
pub enum CollectError {
    /// The report-id harvest failed, so no dependent data can be fetched
    #[error("report id harvest failed: {0}")]
    Harvest(#[source] FetcherError),

    /// A request-level error that aborts the run
    #[error(transparent)]
    Fetcher(#[from] FetcherError),

    /// Checkpoint could not be read
    #[error("checkpoint error: {0}")]
    Checkpoint(#[from] ResumeError),

    /// Shutdown was requested before the run could produce results
    #[error("collection cancelled")]
    Cancelled,

    /// Invalid collector settings
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
