//! CLI command implementations

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::fetcher::fac_config::ClientConfig;
use crate::fetcher::fac_http::FacHttpClient;
use crate::output::DataPaths;
use crate::shutdown::SharedShutdown;
use crate::{Jurisdiction, YearRange};

pub mod cache;
pub mod collect;
pub mod error;
pub mod query;

pub use cache::CacheCommand;
pub use collect::{AwardsArgs, BarProgress, RetryFailedArgs, SweepArgs};
pub use error::CliError;
pub use query::QueryCommand;

/// Bulk extraction client for the Federal Audit Clearinghouse API
#[derive(Parser, Debug)]
#[command(name = "fac-collector", version, about)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Project root holding data/ and logs/
    #[arg(long, global = true, default_value = ".")]
    pub data_dir: PathBuf,

    /// Show progress bars and per-partition narration
    #[arg(long, global = true, default_value_t = false)]
    pub show_progress: bool,

    /// First audit year to sweep (default: 2016)
    #[arg(long, global = true)]
    pub min_year: Option<i32>,

    /// Last audit year to sweep (default: current year)
    #[arg(long, global = true)]
    pub max_year: Option<i32>,

    /// Comma-separated jurisdiction codes to sweep (default: all)
    #[arg(long, global = true)]
    pub jurisdictions: Option<String>,

    /// Per-request timeout in seconds
    #[arg(
        long,
        global = true,
        default_value = "30",
        value_parser = clap::value_parser!(u64).range(1..=3600)
    )]
    pub timeout_secs: u64,

    /// Serve Prometheus metrics on this address (e.g. 127.0.0.1:9000)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run one filtered query and print the records as JSON
    Query(QueryCommand),

    /// Sweep the general table across every year and jurisdiction
    Sweep(SweepArgs),

    /// Collect federal awards for every harvested report id
    Awards(AwardsArgs),

    /// Re-run the failed batches recorded in a checkpoint
    RetryFailed(RetryFailedArgs),

    /// Inspect or clear the local cache directory
    Cache(CacheCommand),
}

impl Cli {
    /// Year range from `--min-year` / `--max-year`
    pub fn year_range(&self) -> Result<YearRange, CliError> {
        let default = YearRange::through_current_year();
        YearRange::new(
            self.min_year.unwrap_or(default.min()),
            self.max_year.unwrap_or(default.max()),
        )
        .map_err(CliError::InvalidArgument)
    }

    /// Jurisdictions from `--jurisdictions`, or all of them
    pub fn jurisdiction_list(&self) -> Result<Vec<Jurisdiction>, CliError> {
        match &self.jurisdictions {
            Some(list) => Ok(Jurisdiction::parse_list(list)?),
            None => Ok(Jurisdiction::all()),
        }
    }

    /// Client configuration from the environment plus global flags
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        Ok(ClientConfig::from_env()
            .map_err(CliError::from_fetcher)?
            .with_years(self.year_range()?)
            .with_jurisdictions(self.jurisdiction_list()?)
            .with_request_timeout(Duration::from_secs(self.timeout_secs)))
    }

    /// HTTP client wired to the shutdown token
    pub fn client(&self, shutdown: SharedShutdown) -> Result<Arc<FacHttpClient>, CliError> {
        let client = FacHttpClient::from_config(self.client_config()?)
            .map_err(CliError::from_fetcher)?
            .with_shutdown(shutdown);
        Ok(Arc::new(client))
    }

    /// Data directory layout under `--data-dir`
    pub fn data_paths(&self) -> Result<DataPaths, CliError> {
        Ok(DataPaths::new(&self.data_dir)?)
    }

    /// Run the selected command
    pub async fn execute(&self, shutdown: SharedShutdown) -> Result<(), CliError> {
        match &self.command {
            Commands::Query(cmd) => cmd.execute(self, shutdown).await,
            Commands::Sweep(args) => args.execute(self, shutdown).await,
            Commands::Awards(args) => args.execute(self, shutdown).await,
            Commands::RetryFailed(args) => args.execute(self, shutdown).await,
            Commands::Cache(cmd) => cmd.execute(self),
        }
    }
}
