//! Exhaustive year x jurisdiction sweep
//!
//! The API caps every response, so a full-table read of `general` is split
//! into one request per (audit year, jurisdiction) pair. Pairs are visited in
//! ascending year order and, within a year, in jurisdiction order. A failing
//! pair is logged, recorded and skipped; the sweep keeps going.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn, Instrument};

use crate::downloader::progress::{LogProgress, ProgressReporter, WorkUnit};
use crate::downloader::rate_limit::RateLimitPolicy;
use crate::downloader::CollectError;
use crate::fetcher::fac_config::resolve_endpoint;
use crate::fetcher::fac_http::FacHttpClient;
use crate::fetcher::query::{FilterSet, GeneralQuery};
use crate::fetcher::FetcherError;
use crate::metrics;
use crate::Record;

/// A (year, jurisdiction) pair that yielded no data because of an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedPartition {
    /// Audit year
    pub year: i32,
    /// Two-letter jurisdiction code
    pub jurisdiction: String,
    /// Error text
    pub error: String,
}

/// Outcome of a sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    /// Records in traversal order
    pub records: Vec<Record>,
    /// Pairs that were skipped
    pub failed_partitions: Vec<FailedPartition>,
    /// Partition requests issued (rate-limit reissues not counted)
    pub requests_made: usize,
    /// Whether the sweep stopped early on shutdown
    pub cancelled: bool,
    /// Error behind the first entry of `failed_partitions`
    pub first_error: Option<FetcherError>,
}

impl SweepReport {
    /// True when every pair was fetched
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed_partitions.is_empty()
    }

    /// True when requests were made and none of them succeeded
    pub fn all_failed(&self) -> bool {
        self.requests_made > 0 && self.failed_partitions.len() == self.requests_made
    }
}

/// Sweeps one endpoint across the configured years and jurisdictions
pub struct ExhaustiveCollector {
    client: Arc<FacHttpClient>,
    reporter: Arc<dyn ProgressReporter>,
}

impl ExhaustiveCollector {
    /// Create a collector that narrates at debug level
    pub fn new(client: Arc<FacHttpClient>) -> Self {
        Self {
            client,
            reporter: Arc::new(LogProgress::new(false)),
        }
    }

    /// Narrate progress at info level
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.reporter = Arc::new(LogProgress::new(show_progress));
        self
    }

    /// Use a custom progress reporter
    pub fn with_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    /// Fetch every (year, jurisdiction) partition of `endpoint`
    ///
    /// Rate limits are always waited out. Per-pair failures are recorded in
    /// [`SweepReport::failed_partitions`] and the sweep continues.
    ///
    /// # Errors
    /// [`CollectError::Fetcher`] if the endpoint name or column list is
    /// invalid (checked before any request). Request failures, 401 included,
    /// never fail the sweep; they land in the report.
    pub async fn collect(
        &self,
        endpoint: &str,
        columns: Option<Vec<String>>,
    ) -> Result<SweepReport, CollectError> {
        let (name, _) = resolve_endpoint(endpoint)?;
        if let Some(columns) = &columns {
            FilterSet::new().select(columns.iter().cloned())?;
        }

        let span = tracing::info_span!("exhaustive_sweep", endpoint = name);
        self.sweep(name, columns.as_deref()).instrument(span).await
    }

    async fn sweep(
        &self,
        name: &'static str,
        columns: Option<&[String]>,
    ) -> Result<SweepReport, CollectError> {
        let config = self.client.config();
        let years = config.years();
        let jurisdictions = config.jurisdictions();
        let cap = config.max_single_request_size();
        let total = years.len() * jurisdictions.len();

        info!(
            endpoint = name,
            years = %years,
            jurisdictions = jurisdictions.len(),
            partitions = total,
            "Starting exhaustive sweep"
        );
        self.reporter.started(WorkUnit::Partitions, name, total);

        let mut report = SweepReport::default();

        'years: for year in years.years() {
            for jurisdiction in jurisdictions {
                if self.client.is_cancelled() {
                    report.cancelled = true;
                    break 'years;
                }

                let mut query = GeneralQuery::new()
                    .audit_year(year)
                    .auditee_state(jurisdiction.code());
                if let Some(columns) = columns {
                    query = query.columns(columns.iter().cloned());
                }
                let filters = query.build()?;
                let label = format!("{year}/{jurisdiction}");

                report.requests_made += 1;
                match self
                    .client
                    .query(name, &filters, RateLimitPolicy::PATIENT)
                    .await
                {
                    Ok(records) => {
                        if records.len() >= cap {
                            warn!(
                                endpoint = name,
                                year,
                                jurisdiction = %jurisdiction,
                                records = records.len(),
                                cap,
                                "Partition reached the row cap; results may be truncated"
                            );
                        }
                        self.reporter
                            .advanced(WorkUnit::Partitions, &label, records.len(), false);
                        report.records.extend(records);
                    }
                    Err(FetcherError::Cancelled { .. }) => {
                        report.cancelled = true;
                        break 'years;
                    }
                    Err(e) => {
                        if matches!(e, FetcherError::AuthenticationFailure { .. }) {
                            error!(
                                endpoint = name,
                                year,
                                jurisdiction = %jurisdiction,
                                "Authentication failed; check API_KEY_FAC"
                            );
                        }
                        warn!(
                            endpoint = name,
                            year,
                            jurisdiction = %jurisdiction,
                            error = %e,
                            "Partition failed; skipping"
                        );
                        metrics::record_partition_failed();
                        self.reporter.advanced(WorkUnit::Partitions, &label, 0, true);
                        report.failed_partitions.push(FailedPartition {
                            year,
                            jurisdiction: jurisdiction.code().to_string(),
                            error: e.to_string(),
                        });
                        report.first_error.get_or_insert(e);
                    }
                }
            }
        }

        if report.cancelled {
            warn!(
                endpoint = name,
                requests = report.requests_made,
                records = report.records.len(),
                "Sweep cancelled; returning partial results"
            );
        }
        info!(
            endpoint = name,
            records = report.records.len(),
            failed_partitions = report.failed_partitions.len(),
            "Exhaustive sweep finished"
        );
        self.reporter.finished(
            WorkUnit::Partitions,
            report.records.len(),
            report.failed_partitions.len(),
        );

        Ok(report)
    }
}
