//! Single-writer lock for a checkpoint store
//!
//! Advisory lock on `<store file name>.lock` using fd-lock, held for the lifetime of a
//! sync run so two processes never append to the same store.

use super::{StoreError, StoreResult};
use fd_lock::RwLock;
use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Exclusive lock on a checkpoint store, released on drop
pub struct StoreLock {
    _lock: RwLock<File>,
    path: PathBuf,
}

impl StoreLock {
    /// Lock file path belonging to `store_path`: the full file name plus `.lock`
    pub fn lock_path(store_path: &Path) -> PathBuf {
        let mut name = store_path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Try to take the lock without blocking.
    ///
    /// Fails with [`StoreError::LockError`] if another process holds it.
    pub fn try_acquire(store_path: &Path) -> StoreResult<Self> {
        let lock_path = Self::lock_path(store_path);
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::IoError(e.to_string()))?;
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| StoreError::LockError(format!("Failed to open lock file: {e}")))?;

        let mut lock = RwLock::new(file);
        match lock.try_write() {
            // The OS lock lives as long as the file handle, not the guard
            Ok(guard) => std::mem::forget(guard),
            Err(e) if e.kind() == ErrorKind::WouldBlock => {
                return Err(StoreError::LockError(format!(
                    "{} is held by another process",
                    lock_path.display()
                )));
            }
            Err(e) => {
                return Err(StoreError::LockError(format!("Failed to acquire lock: {e}")));
            }
        }

        debug!(path = %lock_path.display(), "Acquired checkpoint store lock");
        Ok(Self {
            _lock: lock,
            path: lock_path,
        })
    }

    /// Path of the held lock file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Debug for StoreLock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLock").field("path", &self.path).finish()
    }
}
