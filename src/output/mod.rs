//! Local data directory layout and record writers

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use crate::Record;

pub mod csv;
pub mod json;
pub mod paths;

pub use paths::{CacheFileInfo, CacheType, DataPaths};

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// Output errors
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// CSV write error
    #[error("CSV error: {0}")]
    CsvError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// File or cache name that would escape its directory
    #[error("invalid file name: {0}")]
    InvalidName(String),

    /// Unusable wildcard pattern
    #[error("invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// On-disk format for collected records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum RecordFormat {
    /// Pretty-printed JSON array
    #[default]
    Json,
    /// CSV with a header of every field seen
    Csv,
}

impl RecordFormat {
    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Write `records` to `path` in this format
    pub fn write(&self, path: &Path, records: &[Record]) -> OutputResult<()> {
        match self {
            Self::Json => json::write_json(path, records),
            Self::Csv => csv::write_csv(path, records),
        }
    }
}

/// Write through a temp file in the target directory, then rename over `path`
pub(crate) fn write_atomic<F>(path: &Path, records: usize, body: F) -> OutputResult<()>
where
    F: FnOnce(&mut BufWriter<&File>) -> OutputResult<()>,
{
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent).map_err(|e| OutputError::IoError(e.to_string()))?;

    let temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| OutputError::IoError(format!("Failed to create temp file: {e}")))?;
    {
        let mut writer = BufWriter::with_capacity(DEFAULT_BUFFER_SIZE, temp.as_file());
        body(&mut writer)?;
        writer
            .flush()
            .map_err(|e| OutputError::IoError(format!("Failed to flush output: {e}")))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(|e| OutputError::IoError(format!("Failed to sync output: {e}")))?;
    temp.persist(path)
        .map_err(|e| OutputError::IoError(format!("Failed to persist output: {e}")))?;

    info!(path = %path.display(), records, "Records written");
    Ok(())
}
