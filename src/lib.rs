//! # FAC Collector Library
//!
//! Bulk extraction of audit records from the Federal Audit Clearinghouse (FAC)
//! API into local files for downstream processing.
//!
//! The remote API caps every response at 20,000 rows, offers only coarse
//! filtering, and is intermittently unavailable. This crate turns it into a
//! complete, de-duplicated, fault-tolerant extraction:
//!
//! - **Partitioned sweeps**: the `general` table is swept one
//!   (audit year, jurisdiction) pair at a time so no request can exceed the cap
//! - **Dependent batches**: `federal_awards` is fetched by report id in bounded
//!   `in.(...)` batches, with per-batch retry and failure bookkeeping
//! - **Rate-limit cooperation**: HTTP 429 responses are waited out using the
//!   server's `Retry-After` hint
//! - **Checkpointing**: long batch runs persist their progress and failed
//!   batches so they can be re-run selectively
//!
//! ## Quick Start
//!
//! ```no_run
//! use fac_collector::downloader::ExhaustiveCollector;
//! use fac_collector::fetcher::fac_config::ClientConfig;
//! use fac_collector::fetcher::fac_http::FacHttpClient;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env()?;
//! let client = Arc::new(FacHttpClient::from_config(config)?);
//!
//! let sweep = ExhaustiveCollector::new(client).collect("general", None).await?;
//! println!("{} records, {} failed partitions", sweep.records.len(), sweep.failed_partitions.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! Control flows top-down, data flows back up as record vectors:
//!
//! - [`downloader::batch`] - Dependent-resource batch collector
//! - [`downloader::exhaustive`] - Year x jurisdiction sweep
//! - [`fetcher::query`] - Filter sets and per-endpoint query builders
//! - [`fetcher::fac_http`] - Request executor with the rate-limit handler
//! - [`output`] - Data directory layout and record writers
//! - [`resume`] - Batch-run checkpoints

#![warn(missing_docs)]
#![warn(clippy::all)]

use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// CLI command implementations
pub mod cli;

/// Collection orchestration
pub mod downloader;

/// Request execution against the FAC API
pub mod fetcher;

/// Jurisdiction codes used to partition sweeps
pub mod jurisdiction;

/// Prometheus metrics
pub mod metrics;

/// Local data directory layout and record writers
pub mod output;

/// Checkpoints for batch collection runs
pub mod resume;

/// Cancellation shared across collectors
pub mod shutdown;

pub use jurisdiction::{Jurisdiction, ALL_JURISDICTIONS};

/// One row returned by the remote API.
///
/// The field set is whatever the server sends; no schema is imposed.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// First audit year published by the clearinghouse
pub const MIN_AUDIT_YEAR: i32 = 2016;

/// Documented maximum number of rows a single request may return
pub const MAX_SINGLE_REQUEST_SIZE: usize = 20_000;

/// Years outside this window are rejected by [`YearRange::new`]
pub const YEAR_BOUNDS: std::ops::RangeInclusive<i32> = 1900..=9999;

/// Inclusive range of audit years covered by a collection run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawYearRange")]
pub struct YearRange {
    min: i32,
    max: i32,
}

#[derive(Deserialize)]
struct RawYearRange {
    min: i32,
    max: i32,
}

impl TryFrom<RawYearRange> for YearRange {
    type Error = String;

    fn try_from(raw: RawYearRange) -> Result<Self, Self::Error> {
        Self::new(raw.min, raw.max)
    }
}

impl YearRange {
    /// Create a range, rejecting `min > max` and years outside [`YEAR_BOUNDS`]
    pub fn new(min: i32, max: i32) -> Result<Self, String> {
        for year in [min, max] {
            if !YEAR_BOUNDS.contains(&year) {
                return Err(format!(
                    "Audit year {year} is outside {}..={}",
                    YEAR_BOUNDS.start(),
                    YEAR_BOUNDS.end()
                ));
            }
        }
        if min > max {
            return Err(format!(
                "Minimum audit year ({min}) must not exceed maximum audit year ({max})"
            ));
        }
        Ok(Self { min, max })
    }

    /// [`MIN_AUDIT_YEAR`] through the current calendar year (UTC)
    pub fn through_current_year() -> Self {
        let current = chrono::Utc::now().year();
        Self {
            min: MIN_AUDIT_YEAR,
            max: current.max(MIN_AUDIT_YEAR),
        }
    }

    /// First year (inclusive)
    pub fn min(&self) -> i32 {
        self.min
    }

    /// Last year (inclusive)
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Number of years in the range
    pub fn len(&self) -> usize {
        (i64::from(self.max) - i64::from(self.min) + 1) as usize
    }

    /// Always false; a range holds at least one year
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Years in ascending order
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.min..=self.max
    }
}

impl Default for YearRange {
    fn default() -> Self {
        Self::through_current_year()
    }
}

impl std::fmt::Display for YearRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}
