//! Sweep and batch collection commands

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;
use tracing::{info, warn};

use crate::downloader::batch::{partition, HARVEST_ENDPOINT, KEY_COLUMN};
use crate::downloader::{
    BatchCollector, BatchConfig, BatchReport, CollectError, ExhaustiveCollector, LogProgress,
    ProgressReporter, WorkUnit,
};
use crate::output::{CacheType, DataPaths, RecordFormat};
use crate::shutdown::SharedShutdown;
use crate::Record;

use super::{Cli, CliError};

/// Dependent endpoint collected by `awards`
const AWARDS_ENDPOINT: &str = "federal_awards";

/// Progress bars for `--show-progress`
#[derive(Default)]
pub struct BarProgress {
    bar: Mutex<Option<ProgressBar>>,
}

impl std::fmt::Debug for BarProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self.bar.lock().map(|b| b.is_some()).unwrap_or(false);
        f.debug_struct("BarProgress").field("active", &active).finish()
    }
}

impl BarProgress {
    /// Create a reporter with no active bar
    pub fn new() -> Self {
        Self::default()
    }

    fn style() -> ProgressStyle {
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}")
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
    }
}

impl ProgressReporter for BarProgress {
    fn started(&self, unit: WorkUnit, endpoint: &str, total: usize) {
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::style());
        bar.set_message(format!("{endpoint} {}", unit.plural()));
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(previous) = slot.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn advanced(&self, _unit: WorkUnit, label: &str, _records: usize, failed: bool) {
        if let Ok(slot) = self.bar.lock() {
            if let Some(bar) = slot.as_ref() {
                if failed {
                    bar.set_message(format!("{label} failed"));
                } else {
                    bar.set_message(label.to_string());
                }
                bar.inc(1);
            }
        }
    }

    fn finished(&self, unit: WorkUnit, records: usize, failures: usize) {
        if let Ok(mut slot) = self.bar.lock() {
            if let Some(bar) = slot.take() {
                bar.finish_with_message(format!(
                    "{records} records, {failures} failed {}",
                    unit.plural()
                ));
            }
        }
    }
}

fn reporter(show_progress: bool) -> Arc<dyn ProgressReporter> {
    if show_progress {
        Arc::new(BarProgress::new())
    } else {
        Arc::new(LogProgress::new(false))
    }
}

fn output_path(
    paths: &DataPaths,
    explicit: Option<&Path>,
    stem: &str,
    format: RecordFormat,
) -> Result<PathBuf, CliError> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(paths.raw_data_path(&format!("{stem}.{}", format.extension()))?),
    }
}

/// Arguments for `sweep`
#[derive(Debug, Args)]
pub struct SweepArgs {
    /// Comma-separated columns to keep
    #[arg(long, value_delimiter = ',')]
    pub columns: Option<Vec<String>>,

    /// Output file (default: data/raw/general.<format>)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = RecordFormat::Json)]
    pub format: RecordFormat,
}

impl SweepArgs {
    /// Sweep `general` and write the records
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let paths = cli.data_paths()?;
        let output = output_path(&paths, self.output.as_deref(), "general", self.format)?;

        let client = cli.client(shutdown)?;
        let sweep = ExhaustiveCollector::new(client)
            .with_reporter(reporter(cli.show_progress))
            .collect(HARVEST_ENDPOINT, self.columns.clone())
            .await?;

        self.format.write(&output, &sweep.records)?;

        for failed in &sweep.failed_partitions {
            warn!(
                year = failed.year,
                jurisdiction = %failed.jurisdiction,
                error = %failed.error,
                "Partition missing from output"
            );
        }
        println!(
            "Collected {} records ({} requests, {} failed partitions) -> {}",
            sweep.records.len(),
            sweep.requests_made,
            sweep.failed_partitions.len(),
            output.display()
        );

        if sweep.cancelled {
            return Err(CollectError::Cancelled.into());
        }
        Ok(())
    }
}

/// Arguments for `awards`
#[derive(Debug, Args)]
pub struct AwardsArgs {
    /// Report ids per request
    #[arg(long, default_value = "250", value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub batch_size: u64,

    /// Attempts per batch on network failures
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Checkpoint file (default: data/cache/federal_awards_batches_cache.json)
    #[arg(long)]
    pub checkpoint: Option<PathBuf>,

    /// Output file (default: data/raw/federal_awards.<format>)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = RecordFormat::Json)]
    pub format: RecordFormat,
}

impl AwardsArgs {
    /// Harvest report ids, then fetch federal awards batch by batch
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let paths = cli.data_paths()?;
        let output = output_path(&paths, self.output.as_deref(), AWARDS_ENDPOINT, self.format)?;
        let checkpoint = match &self.checkpoint {
            Some(path) => path.clone(),
            None => paths.cache_path("federal_awards_batches", &CacheType::Json)?,
        };

        let config = BatchConfig::new()
            .with_batch_size(self.batch_size as usize)
            .with_max_attempts(self.max_retries)
            .with_checkpoint_path(&checkpoint);

        let collector = BatchCollector::new(cli.client(shutdown.clone())?, config)?
            .with_reporter(reporter(cli.show_progress))
            .with_shutdown(shutdown);

        let report_ids = collector.harvest().await?;
        let ids_cache = paths.cache_path("fac_report_ids", &CacheType::Json)?;
        let id_records: Vec<Record> = report_ids
            .iter()
            .map(|id| {
                let mut record = Record::new();
                record.insert(KEY_COLUMN.to_string(), Value::String(id.clone()));
                record
            })
            .collect();
        RecordFormat::Json.write(&ids_cache, &id_records)?;

        let batches = partition(&report_ids, collector.config().batch_size());
        info!(
            unique_report_ids = report_ids.len(),
            batches = batches.len(),
            "Fetching federal awards"
        );
        let report = collector.collect_batches(AWARDS_ENDPOINT, batches).await?;

        finish_batch_run(&report, &output, self.format, &checkpoint)
    }
}

/// Arguments for `retry-failed`
#[derive(Debug, Args)]
pub struct RetryFailedArgs {
    /// Checkpoint written by a previous `awards` run
    #[arg(long)]
    pub checkpoint: PathBuf,

    /// Attempts per batch on network failures
    #[arg(long, default_value = "3", value_parser = clap::value_parser!(u32).range(1..=20))]
    pub max_retries: u32,

    /// Output file (default: data/raw/federal_awards_retry.<format>)
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = RecordFormat::Json)]
    pub format: RecordFormat,
}

impl RetryFailedArgs {
    /// Re-run the failed batches of a checkpoint; the checkpoint is then
    /// rewritten with whatever still fails
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let paths = cli.data_paths()?;
        let output = output_path(
            &paths,
            self.output.as_deref(),
            "federal_awards_retry",
            self.format,
        )?;

        let previous = crate::resume::BatchCheckpoint::load(&self.checkpoint)?;
        let config = BatchConfig::new()
            .with_batch_size(previous.batch_size().max(1))
            .with_max_attempts(self.max_retries)
            .with_checkpoint_path(&self.checkpoint);

        let collector = BatchCollector::new(cli.client(shutdown.clone())?, config)?
            .with_reporter(reporter(cli.show_progress))
            .with_shutdown(shutdown);

        if previous.failed_batches().is_empty() {
            println!("No failed batches in {}", self.checkpoint.display());
            return Ok(());
        }

        let report = collector
            .retry_failed(previous.endpoint(), previous.failed_batches())
            .await?;

        finish_batch_run(&report, &output, self.format, &self.checkpoint)
    }
}

fn finish_batch_run(
    report: &BatchReport,
    output: &Path,
    format: RecordFormat,
    checkpoint: &Path,
) -> Result<(), CliError> {
    format.write(output, &report.records)?;

    println!(
        "Collected {} records from {} batches ({} unique report ids) -> {}",
        report.records.len(),
        report.total_batches,
        report.unique_keys,
        output.display()
    );
    if !report.failed_batches.is_empty() {
        let numbers: Vec<String> = report
            .failed_batches
            .iter()
            .map(|f| f.batch_number.to_string())
            .collect();
        println!(
            "{} failed batches: {}. Re-run with: fac-collector retry-failed --checkpoint {}",
            report.failed_batches.len(),
            numbers.join(", "),
            checkpoint.display()
        );
    }

    if report.cancelled {
        return Err(CollectError::Cancelled.into());
    }
    Ok(())
}
