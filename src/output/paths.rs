//! Project data directory layout
//!
//! ```text
//! <root>/
//!   data/
//!     cache/       <name>_cache.<ext>
//!     raw/         collected records
//!     processed/   downstream outputs
//!   logs/          <name>.log
//! ```
//!
//! Directories are created when a [`DataPaths`] is constructed.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{info, warn};

use super::{OutputError, OutputResult};

/// Kind of cache file, which decides its extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheType {
    /// `.json`
    Json,
    /// `.db` (`db` or `sqlite`)
    Db,
    /// `.txt` (`text` or `txt`)
    Text,
    /// Any other type, used verbatim as the extension
    Other(String),
}

impl CacheType {
    /// Extension including the leading dot
    pub fn extension(&self) -> String {
        match self {
            Self::Json => ".json".to_string(),
            Self::Db => ".db".to_string(),
            Self::Text => ".txt".to_string(),
            Self::Other(ext) => format!(".{ext}"),
        }
    }
}

impl FromStr for CacheType {
    type Err = OutputError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        match lower.as_str() {
            "json" => Ok(Self::Json),
            "db" | "sqlite" => Ok(Self::Db),
            "text" | "txt" => Ok(Self::Text),
            "" => Err(OutputError::InvalidName("empty cache type".to_string())),
            other if other.chars().all(|c| c.is_ascii_alphanumeric()) => {
                Ok(Self::Other(other.to_string()))
            }
            other => Err(OutputError::InvalidName(format!(
                "cache type '{other}' must be alphanumeric"
            ))),
        }
    }
}

/// Size and modification time of one cache file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheFileInfo {
    /// File name
    pub name: String,
    /// Full path
    pub path: PathBuf,
    /// Size in bytes
    pub size_bytes: u64,
    /// Last modification time
    pub modified: DateTime<Utc>,
}

impl CacheFileInfo {
    /// Size in megabytes, rounded to two decimals
    pub fn size_mb(&self) -> f64 {
        (self.size_bytes as f64 / 1024.0 / 1024.0 * 100.0).round() / 100.0
    }
}

/// Resolved directories under a project root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
    data_dir: PathBuf,
    cache_dir: PathBuf,
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    logs_dir: PathBuf,
}

impl DataPaths {
    /// Lay out (and create) the directory tree under `root`
    pub fn new(root: impl Into<PathBuf>) -> OutputResult<Self> {
        let root = root.into();
        let data_dir = root.join("data");
        let paths = Self {
            cache_dir: data_dir.join("cache"),
            raw_dir: data_dir.join("raw"),
            processed_dir: data_dir.join("processed"),
            logs_dir: root.join("logs"),
            data_dir,
            root,
        };

        for dir in [
            &paths.data_dir,
            &paths.cache_dir,
            &paths.raw_dir,
            &paths.processed_dir,
            &paths.logs_dir,
        ] {
            std::fs::create_dir_all(dir).map_err(|e| {
                OutputError::IoError(format!("Failed to create {}: {e}", dir.display()))
            })?;
        }

        Ok(paths)
    }

    /// Project root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `data/cache`
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// `data/cache/<name>_cache<ext>`
    pub fn cache_path(&self, name: &str, cache_type: &CacheType) -> OutputResult<PathBuf> {
        let name = checked_name(name)?;
        Ok(self
            .cache_dir
            .join(format!("{name}_cache{}", cache_type.extension())))
    }

    /// `data/raw/<filename>`
    pub fn raw_data_path(&self, filename: &str) -> OutputResult<PathBuf> {
        Ok(self.raw_dir.join(checked_name(filename)?))
    }

    /// `data/processed/<filename>`
    pub fn processed_data_path(&self, filename: &str) -> OutputResult<PathBuf> {
        Ok(self.processed_dir.join(checked_name(filename)?))
    }

    /// `logs/<name>.log`
    pub fn log_path(&self, name: &str) -> OutputResult<PathBuf> {
        let name = checked_name(name)?;
        Ok(self.logs_dir.join(format!("{name}.log")))
    }

    /// Regular files in the cache directory, sorted by name
    pub fn list_cache_files(&self) -> OutputResult<Vec<PathBuf>> {
        if !self.cache_dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(&self.cache_dir)
            .map_err(|e| OutputError::IoError(e.to_string()))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| OutputError::IoError(e.to_string()))?;
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Size and modification time for every cache file
    pub fn cache_info(&self) -> OutputResult<Vec<CacheFileInfo>> {
        self.list_cache_files()?
            .into_iter()
            .map(|path| {
                let meta =
                    std::fs::metadata(&path).map_err(|e| OutputError::IoError(e.to_string()))?;
                let modified = meta
                    .modified()
                    .map_err(|e| OutputError::IoError(e.to_string()))?;
                Ok(CacheFileInfo {
                    name: file_name(&path),
                    size_bytes: meta.len(),
                    modified: DateTime::<Utc>::from(modified),
                    path,
                })
            })
            .collect()
    }

    /// Delete cache files
    ///
    /// With a `pattern` (shell wildcard such as `fac_*`), matching files are
    /// deleted directly. Without one, every cache file is a candidate and
    /// `confirm` must approve the list first. Returns how many files were
    /// deleted; a file that cannot be removed is logged and skipped.
    pub fn clear_cache<F>(&self, pattern: Option<&str>, confirm: F) -> OutputResult<usize>
    where
        F: FnOnce(&[PathBuf]) -> bool,
    {
        let candidates = match pattern {
            Some(pattern) => {
                let matcher = wildcard_regex(pattern)?;
                self.list_cache_files()?
                    .into_iter()
                    .filter(|p| matcher.is_match(&file_name(p)))
                    .collect::<Vec<_>>()
            }
            None => self.list_cache_files()?,
        };

        if candidates.is_empty() {
            info!(pattern = ?pattern, "No cache files found to delete");
            return Ok(0);
        }

        if pattern.is_none() && !confirm(&candidates) {
            info!(files = candidates.len(), "Cache clearing cancelled");
            return Ok(0);
        }

        let mut deleted = 0;
        for path in &candidates {
            match std::fs::remove_file(path) {
                Ok(()) => {
                    info!(file = %file_name(path), "Deleted cache file");
                    deleted += 1;
                }
                Err(e) => warn!(file = %file_name(path), error = %e, "Failed to delete cache file"),
            }
        }
        Ok(deleted)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn checked_name(name: &str) -> OutputResult<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty()
        || trimmed == "."
        || trimmed.contains("..")
        || trimmed.contains(['/', '\\'])
    {
        return Err(OutputError::InvalidName(name.to_string()));
    }
    Ok(trimmed)
}

/// Translate a shell wildcard (`*`, `?`) into an anchored regex
pub fn wildcard_regex(pattern: &str) -> OutputResult<Regex> {
    if pattern.trim().is_empty() || pattern.contains(['/', '\\']) {
        return Err(OutputError::InvalidPattern(pattern.to_string()));
    }

    let mut expr = String::from("^");
    for c in pattern.chars() {
        match c {
            '*' => expr.push_str(".*"),
            '?' => expr.push('.'),
            other => expr.push_str(&regex::escape(&other.to_string())),
        }
    }
    expr.push('$');

    Regex::new(&expr).map_err(|e| OutputError::InvalidPattern(e.to_string()))
}
