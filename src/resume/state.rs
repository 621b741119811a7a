//! Checkpoint file persistence
//!
//! Writes go to a temp file in the target directory, are synced, then renamed
//! over the target while an exclusive lock is held. Reads take a shared lock
//! and refuse oversized files.

use std::io::Write;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use super::lock::checkpoint_lock;

/// Maximum checkpoint file size (64 MB); failed batches carry their id lists
pub const MAX_STATE_FILE_SIZE: u64 = 64 * 1024 * 1024;

/// Serialize `value` as pretty JSON and atomically replace `path`
pub fn save_atomic<T: Serialize>(value: &T, path: &Path) -> Result<(), ResumeError> {
    debug!(path = %path.display(), "Saving checkpoint");

    let json = serde_json::to_string_pretty(value)
        .map_err(|e| ResumeError::SerializationError(e.to_string()))?;

    let mut lock = checkpoint_lock(path)?;
    let _guard = lock
        .write()
        .map_err(|e| ResumeError::LockError(format!("Failed to acquire write lock: {e}")))?;

    let parent_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut temp_file = tempfile::NamedTempFile::new_in(parent_dir)
        .map_err(|e| ResumeError::IoError(format!("Failed to create temp file: {e}")))?;

    temp_file
        .write_all(json.as_bytes())
        .map_err(|e| ResumeError::IoError(format!("Failed to write to temp file: {e}")))?;
    temp_file
        .flush()
        .map_err(|e| ResumeError::IoError(format!("Failed to flush temp file: {e}")))?;
    temp_file
        .as_file()
        .sync_all()
        .map_err(|e| ResumeError::IoError(format!("Failed to sync temp file: {e}")))?;
    temp_file
        .persist(path)
        .map_err(|e| ResumeError::IoError(format!("Failed to persist temp file: {e}")))?;

    if let Ok(dir) = std::fs::File::open(parent_dir) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Read and deserialize the JSON document at `path`
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, ResumeError> {
    debug!(path = %path.display(), "Loading checkpoint");

    let metadata = std::fs::metadata(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ResumeError::NotFound(path.display().to_string())
        } else {
            ResumeError::IoError(e.to_string())
        }
    })?;

    let lock = checkpoint_lock(path)?;
    let _guard = lock
        .read()
        .map_err(|e| ResumeError::LockError(format!("Failed to acquire read lock: {e}")))?;

    if metadata.len() > MAX_STATE_FILE_SIZE {
        return Err(ResumeError::StateTooLarge {
            size: metadata.len(),
            max: MAX_STATE_FILE_SIZE,
        });
    }

    let contents =
        std::fs::read_to_string(path).map_err(|e| ResumeError::IoError(e.to_string()))?;

    serde_json::from_str(&contents).map_err(|e| {
        warn!(path = %path.display(), error = %e, "Failed to deserialize checkpoint");
        ResumeError::DeserializationError(e.to_string())
    })
}

/// Errors related to checkpoint files
#[derive(Debug, thiserror::Error)]
pub enum ResumeError {
    /// Schema version mismatch
    #[error("schema version mismatch: expected {expected}, found {found}")]
    SchemaVersionMismatch {
        /// Expected schema version
        expected: String,
        /// Found schema version
        found: String,
    },

    /// Checkpoint file too large
    #[error("checkpoint file too large: {size} bytes (max: {max} bytes)")]
    StateTooLarge {
        /// Actual file size
        size: u64,
        /// Maximum allowed size
        max: u64,
    },

    /// Checkpoint file does not exist
    #[error("checkpoint not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("IO error: {0}")]
    IoError(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Deserialization error
    #[error("deserialization error: {0}")]
    DeserializationError(String),

    /// Lock error
    #[error("lock error: {0}")]
    LockError(String),
}
