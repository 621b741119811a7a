//! Single filtered query command

use clap::{Args, Subcommand};
use tracing::info;

use crate::fetcher::query::{FederalAwardsQuery, GeneralQuery};
use crate::shutdown::SharedShutdown;
use crate::Record;

use super::error::render_json;
use super::{Cli, CliError};

/// Query subcommand
#[derive(Debug, Args)]
pub struct QueryCommand {
    #[command(subcommand)]
    endpoint: QueryEndpoint,

    /// Comma-separated columns to return
    #[arg(long, global = true, value_delimiter = ',')]
    columns: Option<Vec<String>>,

    /// Wait out HTTP 429 responses instead of failing
    #[arg(long, global = true, default_value_t = false)]
    handle_429: bool,
}

#[derive(Debug, Subcommand)]
enum QueryEndpoint {
    /// Query the general table
    General(GeneralArgs),
    /// Query the federal_awards table
    FederalAwards(FederalAwardsArgs),
}

#[derive(Debug, Args)]
struct GeneralArgs {
    /// Report id
    #[arg(long)]
    report_id: Option<String>,
    /// Auditee UEI
    #[arg(long)]
    auditee_uei: Option<String>,
    /// Auditee EIN
    #[arg(long)]
    auditee_ein: Option<String>,
    /// Substring of the auditee name (case-insensitive)
    #[arg(long)]
    auditee_name: Option<String>,
    /// Auditee city
    #[arg(long)]
    auditee_city: Option<String>,
    /// Two-letter auditee state
    #[arg(long)]
    auditee_state: Option<String>,
    /// Audit year
    #[arg(long)]
    audit_year: Option<i32>,
}

impl GeneralArgs {
    fn to_query(&self, columns: Option<&[String]>) -> GeneralQuery {
        GeneralQuery {
            columns: columns.map(<[String]>::to_vec),
            report_id: self.report_id.clone(),
            auditee_uei: self.auditee_uei.clone(),
            auditee_ein: self.auditee_ein.clone(),
            auditee_name: self.auditee_name.clone(),
            auditee_city: self.auditee_city.clone(),
            auditee_state: self.auditee_state.clone(),
            audit_year: self.audit_year,
        }
    }
}

#[derive(Debug, Args)]
struct FederalAwardsArgs {
    /// Report id
    #[arg(long)]
    report_id: Option<String>,
    /// Federal agency prefix (e.g. 93)
    #[arg(long)]
    federal_agency_prefix: Option<String>,
    /// Award extension; requires --federal-agency-prefix
    #[arg(long)]
    federal_award_extension: Option<String>,
    /// Substring of the additional award identification
    #[arg(long)]
    additional_award_identification: Option<String>,
    /// Substring of the program name
    #[arg(long)]
    federal_program_name: Option<String>,
    /// Substring of the cluster name
    #[arg(long)]
    cluster_name: Option<String>,
}

impl FederalAwardsArgs {
    fn to_query(&self, columns: Option<&[String]>) -> FederalAwardsQuery {
        FederalAwardsQuery {
            columns: columns.map(<[String]>::to_vec),
            report_id: self.report_id.clone(),
            federal_agency_prefix: self.federal_agency_prefix.clone(),
            federal_award_extension: self.federal_award_extension.clone(),
            additional_award_identification: self.additional_award_identification.clone(),
            federal_program_name: self.federal_program_name.clone(),
            cluster_name: self.cluster_name.clone(),
        }
    }
}

impl QueryCommand {
    /// Run the query and print the records as pretty JSON on stdout
    pub async fn execute(&self, cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
        let client = cli.client(shutdown)?;
        let columns = self.columns.as_deref();

        let records: Vec<Record> = match &self.endpoint {
            QueryEndpoint::General(args) => {
                client
                    .get_general(&args.to_query(columns), self.handle_429)
                    .await?
            }
            QueryEndpoint::FederalAwards(args) => {
                client
                    .get_federal_awards(&args.to_query(columns), self.handle_429)
                    .await?
            }
        };

        info!(records = records.len(), "Query complete");
        println!("{}", render_json(&records)?);
        Ok(())
    }
}
