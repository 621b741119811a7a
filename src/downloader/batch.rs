//! Dependent-resource batch collector
//!
//! `federal_awards` can only be filtered efficiently by report id, and the
//! ids can only be discovered by sweeping `general`. A run therefore:
//!
//! 1. harvests every report id with an [`ExhaustiveCollector`] sweep projected
//!    onto `report_id` (failure here is fatal)
//! 2. deduplicates them into a sorted set
//! 3. partitions the set into batches of at most `batch_size` ids
//! 4. fetches each batch with an `in.(...)` filter, retrying network failures
//!    with exponential backoff and recording batches that still fail
//! 5. pauses between batches and checkpoints progress periodically

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn, Instrument};

use crate::downloader::config::BatchConfig;
use crate::downloader::exhaustive::ExhaustiveCollector;
use crate::downloader::progress::{LogProgress, ProgressReporter, WorkUnit};
use crate::downloader::rate_limit::RateLimitPolicy;
use crate::downloader::sleep::{Pause, Sleeper};
use crate::downloader::CollectError;
use crate::fetcher::fac_config::resolve_endpoint;
use crate::fetcher::fac_http::FacHttpClient;
use crate::fetcher::query::report_id_batch;
use crate::fetcher::retry_formatter::BatchRetryContext;
use crate::fetcher::FetcherError;
use crate::metrics;
use crate::resume::BatchCheckpoint;
use crate::shutdown::SharedShutdown;
use crate::Record;

/// Endpoint swept for foreign keys
pub const HARVEST_ENDPOINT: &str = "general";

/// Foreign-key column linking dependent rows to `general`
pub const KEY_COLUMN: &str = "report_id";

/// Error text for batches left unprocessed by a cancelled run
const NOT_ATTEMPTED: &str = "not attempted: run cancelled";

/// One batch of report ids
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    /// 1-based position in the run
    pub number: usize,
    /// Report ids, in set order
    pub report_ids: Vec<String>,
}

/// A batch given up on, with enough detail to re-run it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBatch {
    /// 1-based position in the original run
    pub batch_number: usize,
    /// Report ids of the batch
    pub report_ids: Vec<String>,
    /// Last error text
    pub error: String,
}

impl From<&FailedBatch> for Batch {
    fn from(failed: &FailedBatch) -> Self {
        Batch {
            number: failed.batch_number,
            report_ids: failed.report_ids.clone(),
        }
    }
}

/// Outcome of a batch run
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Records in batch order
    pub records: Vec<Record>,
    /// Batches in the run
    pub total_batches: usize,
    /// Batches that failed or were never attempted
    pub failed_batches: Vec<FailedBatch>,
    /// Distinct report ids across all batches
    pub unique_keys: usize,
    /// Whether the run stopped early on shutdown
    pub cancelled: bool,
}

impl BatchReport {
    /// True when every batch was fetched
    pub fn is_complete(&self) -> bool {
        !self.cancelled && self.failed_batches.is_empty()
    }
}

enum BatchOutcome {
    Fetched(Vec<Record>),
    Failed(FailedBatch),
    Cancelled,
}

/// Collects a dependent resource by report-id batches
pub struct BatchCollector {
    client: Arc<FacHttpClient>,
    config: BatchConfig,
    reporter: Arc<dyn ProgressReporter>,
    pause: Pause,
}

impl std::fmt::Debug for BatchCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchCollector")
            .field("config", &self.config)
            .field("pause", &self.pause)
            .finish_non_exhaustive()
    }
}

impl BatchCollector {
    /// Create a collector
    ///
    /// # Errors
    /// [`CollectError::InvalidArgument`] if `config` has a zero batch size,
    /// attempt cap or checkpoint interval.
    pub fn new(client: Arc<FacHttpClient>, config: BatchConfig) -> Result<Self, CollectError> {
        config.validate()?;
        Ok(Self {
            client,
            config,
            reporter: Arc::new(LogProgress::new(false)),
            pause: Pause::default(),
        })
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

    /// Replace the sleeper used for backoff and pacing
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.pause = self.pause.with_sleeper(sleeper);
        self
    }

    /// Let a shutdown request interrupt the run
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.pause = self.pause.with_shutdown(shutdown);
        self
    }

    /// Collector settings
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Harvest, deduplicate, partition and fetch every batch of `endpoint`
    ///
    /// # Errors
    /// - [`CollectError::Harvest`] if the report-id sweep fails
    /// - [`CollectError::Cancelled`] if shutdown interrupts the harvest
    /// - [`CollectError::Fetcher`] if `endpoint` is unknown
    pub async fn collect(&self, endpoint: &str) -> Result<BatchReport, CollectError> {
        let (name, _) = resolve_endpoint(endpoint)?;

        let report_ids = self.harvest().await?;
        let batches = partition(&report_ids, self.config.batch_size());
        info!(
            endpoint = name,
            unique_report_ids = report_ids.len(),
            batches = batches.len(),
            batch_size = self.config.batch_size(),
            "Report ids partitioned into batches"
        );

        self.collect_batches(name, batches).await
    }

    /// Sweep the primary table for the deduplicated set of report ids
    ///
    /// Some failed partitions only cost their ids (with a warning). When every
    /// partition fails the harvest itself has failed.
    ///
    /// # Errors
    /// [`CollectError::Harvest`] on a sweep-level failure or when no
    /// partition succeeded, [`CollectError::Cancelled`] if the sweep was
    /// interrupted.
    pub async fn harvest(&self) -> Result<BTreeSet<String>, CollectError> {
        let sweep = ExhaustiveCollector::new(self.client.clone())
            .with_reporter(self.reporter.clone())
            .collect(HARVEST_ENDPOINT, Some(vec![KEY_COLUMN.to_string()]))
            .await
            .map_err(|e| match e {
                CollectError::Fetcher(source) => CollectError::Harvest(source),
                other => other,
            })?;

        if sweep.cancelled {
            warn!("Report id harvest cancelled");
            return Err(CollectError::Cancelled);
        }
        if sweep.all_failed() {
            if let Some(source) = sweep.first_error {
                error!(
                    failed_partitions = sweep.failed_partitions.len(),
                    "Every harvest partition failed; no report ids to fetch"
                );
                return Err(CollectError::Harvest(source));
            }
        }
        if !sweep.failed_partitions.is_empty() {
            warn!(
                failed_partitions = sweep.failed_partitions.len(),
                "Harvest skipped some partitions; their report ids are missing"
            );
        }

        let harvested = sweep.records.len();
        let report_ids = dedupe(&sweep.records);
        info!(
            harvested,
            unique = report_ids.len(),
            "Report id harvest complete"
        );
        Ok(report_ids)
    }

    /// Fetch an explicit list of batches from `endpoint`
    ///
    /// Runs every batch even when some fail. With a checkpoint path
    /// configured, progress is saved every `checkpoint_interval` batches and
    /// once more at the end.
    pub async fn collect_batches(
        &self,
        endpoint: &str,
        batches: Vec<Batch>,
    ) -> Result<BatchReport, CollectError> {
        let (name, _) = resolve_endpoint(endpoint)?;
        let span = tracing::info_span!("batch_collect", endpoint = name, batches = batches.len());
        Ok(self.run_batches(name, batches).instrument(span).await)
    }

    /// Re-run exactly the given failed batches, keeping their numbers
    pub async fn retry_failed(
        &self,
        endpoint: &str,
        failed: &[FailedBatch],
    ) -> Result<BatchReport, CollectError> {
        info!(batches = failed.len(), "Re-running failed batches");
        let batches = failed.iter().map(Batch::from).collect();
        self.collect_batches(endpoint, batches).await
    }

    /// Re-run the failed batches recorded in the checkpoint at `path`
    ///
    /// # Errors
    /// [`CollectError::Checkpoint`] if the checkpoint cannot be loaded.
    pub async fn retry_from_checkpoint(&self, path: &Path) -> Result<BatchReport, CollectError> {
        let checkpoint = BatchCheckpoint::load(path)?;
        info!(
            path = %path.display(),
            endpoint = checkpoint.endpoint(),
            failed = checkpoint.failed_batches().len(),
            "Loaded checkpoint"
        );
        self.retry_failed(checkpoint.endpoint(), checkpoint.failed_batches())
            .await
    }

    async fn run_batches(&self, name: &'static str, batches: Vec<Batch>) -> BatchReport {
        let total = batches.len();
        let mut report = BatchReport {
            total_batches: total,
            unique_keys: batches
                .iter()
                .flat_map(|b| b.report_ids.iter())
                .collect::<BTreeSet<_>>()
                .len(),
            ..BatchReport::default()
        };

        let mut checkpoint = self
            .config
            .checkpoint_path()
            .map(|_| BatchCheckpoint::new(name, self.config.batch_size(), total));

        self.reporter.started(WorkUnit::Batches, name, total);

        let mut processed = 0;
        for (index, batch) in batches.iter().enumerate() {
            if self.pause.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let label = format!("batch {}", batch.number);
            match self.fetch_batch(name, batch, total).await {
                BatchOutcome::Fetched(records) => {
                    self.reporter
                        .advanced(WorkUnit::Batches, &label, records.len(), false);
                    report.records.extend(records);
                }
                BatchOutcome::Failed(failed) => {
                    self.reporter.advanced(WorkUnit::Batches, &label, 0, true);
                    report.failed_batches.push(failed);
                }
                BatchOutcome::Cancelled => {
                    report.cancelled = true;
                    break;
                }
            }
            processed += 1;

            if let Some(cp) = checkpoint.as_mut() {
                if processed % self.config.checkpoint_interval() == 0 {
                    cp.record_progress(processed, report.records.len(), &report.failed_batches);
                    self.save_checkpoint(cp);
                }
            }

            let is_last = index + 1 == total;
            if !is_last && !self.pause.wait(self.config.batch_delay()).await {
                report.cancelled = true;
                break;
            }
        }

        if report.cancelled {
            let pending = &batches[processed..];
            warn!(
                endpoint = name,
                processed,
                pending = pending.len(),
                "Batch run cancelled; unprocessed batches recorded as failed"
            );
            report
                .failed_batches
                .extend(pending.iter().map(|batch| FailedBatch {
                    batch_number: batch.number,
                    report_ids: batch.report_ids.clone(),
                    error: NOT_ATTEMPTED.to_string(),
                }));
        }

        if let Some(cp) = checkpoint.as_mut() {
            cp.record_progress(processed, report.records.len(), &report.failed_batches);
            self.save_checkpoint(cp);
        }

        if report.failed_batches.is_empty() {
            info!(
                endpoint = name,
                records = report.records.len(),
                batches = total,
                "All batches collected"
            );
        } else {
            let numbers: Vec<usize> = report
                .failed_batches
                .iter()
                .map(|f| f.batch_number)
                .collect();
            warn!(
                endpoint = name,
                records = report.records.len(),
                failed = report.failed_batches.len(),
                failed_batches = ?numbers,
                "Batch collection finished with failed batches"
            );
        }
        self.reporter.finished(
            WorkUnit::Batches,
            report.records.len(),
            report.failed_batches.len(),
        );

        report
    }

    async fn fetch_batch(&self, name: &'static str, batch: &Batch, total: usize) -> BatchOutcome {
        let failed = |error: String| {
            BatchOutcome::Failed(FailedBatch {
                batch_number: batch.number,
                report_ids: batch.report_ids.clone(),
                error,
            })
        };

        let filters = match report_id_batch(&batch.report_ids) {
            Ok(filters) => filters,
            Err(e) => {
                warn!(batch = batch.number, error = %e, "Batch has no usable report ids");
                metrics::record_batch_failed();
                return failed(e.to_string());
            }
        };

        let max_attempts = self.config.max_attempts();
        let mut attempt = 1;
        loop {
            let err = match self
                .client
                .query(name, &filters, RateLimitPolicy::PATIENT)
                .await
            {
                Ok(records) => return BatchOutcome::Fetched(records),
                Err(FetcherError::Cancelled { .. }) => return BatchOutcome::Cancelled,
                Err(e) => e,
            };

            let backoff = self.config.backoff_after(attempt);
            let ctx = BatchRetryContext::new(
                batch.number,
                total,
                attempt,
                max_attempts,
                backoff,
                batch.report_ids.len(),
                &err,
            );

            if ctx.error_type.is_retryable() && attempt < max_attempts {
                warn!(
                    batch = batch.number,
                    attempt,
                    backoff_ms = backoff.as_millis() as u64,
                    "{}",
                    ctx.format_retry()
                );
                metrics::record_batch_retry(attempt);
                if !self.pause.wait(backoff).await {
                    return BatchOutcome::Cancelled;
                }
                attempt += 1;
                continue;
            }

            warn!(batch = batch.number, attempt, "{}", ctx.format_failure());
            metrics::record_batch_failed();
            return failed(err.to_string());
        }
    }

    fn save_checkpoint(&self, checkpoint: &BatchCheckpoint) {
        let Some(path) = self.config.checkpoint_path() else {
            return;
        };
        if let Err(e) = checkpoint.save(path) {
            warn!(path = %path.display(), error = %e, "Failed to save checkpoint");
        }
    }
}

/// Collapse harvested rows into a sorted set of report ids
///
/// Rows without a usable `report_id` are skipped with a warning. Numeric ids
/// are kept in their decimal form.
pub fn dedupe(records: &[Record]) -> BTreeSet<String> {
    let mut ids = BTreeSet::new();
    let mut skipped = 0usize;
    for record in records {
        match record.get(KEY_COLUMN) {
            Some(Value::String(id)) if !id.trim().is_empty() => {
                ids.insert(id.trim().to_string());
            }
            Some(Value::Number(id)) => {
                ids.insert(id.to_string());
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "Harvested rows without a report id were ignored");
    }
    ids
}

/// Split `ids` into consecutive batches of at most `batch_size`
///
/// Yields `ceil(n / batch_size)` batches numbered from 1; only the last may
/// be short. A zero `batch_size` yields no batches.
pub fn partition<'a, I>(ids: I, batch_size: usize) -> Vec<Batch>
where
    I: IntoIterator<Item = &'a String>,
{
    if batch_size == 0 {
        return Vec::new();
    }
    let ids: Vec<String> = ids.into_iter().cloned().collect();
    ids.chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| Batch {
            number: index + 1,
            report_ids: chunk.to_vec(),
        })
        .collect()
}
