//! CLI error types and conversions

use crate::downloader::CollectError;
use crate::fetcher::FetcherError;
use crate::jurisdiction::JurisdictionError;
use crate::output::OutputError;
use serde::Serialize;
use crate::resume::ResumeError;

/// CLI errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Jurisdiction list error
    #[error("jurisdiction error: {0}")]
    JurisdictionError(#[from] JurisdictionError),

    /// Collection error
    #[error("collection error: {0}")]
    CollectError(#[from] CollectError),

    /// Fetcher error
    #[error("fetcher error: {0}")]
    FetcherError(#[from] FetcherError),

    /// Output error
    #[error("output error: {0}")]
    OutputError(#[from] OutputError),

    /// Resume error
    #[error("checkpoint error: {0}")]
    ResumeError(#[from] ResumeError),

    /// Invalid argument
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    ConfigurationError(String),
}

impl CliError {
    /// Lift configuration problems out of the fetcher layer
    pub fn from_fetcher(err: FetcherError) -> Self {
        match err {
            FetcherError::Configuration(msg) => Self::ConfigurationError(msg),
            other => Self::FetcherError(other),
        }
    }
}

/// Pretty JSON for stdout
pub(crate) fn render_json<T: Serialize + ?Sized>(value: &T) -> Result<String, CliError> {
    serde_json::to_string_pretty(value)
        .map_err(|e| OutputError::SerializationError(e.to_string()).into())
}
