//! Advisory lock file guarding a checkpoint

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fd_lock::RwLock;

use super::state::ResumeError;

/// Lock file beside `path` (`<path>.lock`)
pub fn lock_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}

/// Open (creating if needed) the lock file for `path`, wrapped for locking
///
/// Callers take `.write()` to save and `.read()` to load; the guard releases
/// on drop.
pub fn checkpoint_lock(path: &Path) -> Result<RwLock<File>, ResumeError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| ResumeError::IoError(e.to_string()))?;
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(lock_path(path))
        .map_err(|e| ResumeError::LockError(format!("Failed to open lock file: {e}")))?;

    Ok(RwLock::new(file))
}
