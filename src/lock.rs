//! Run lock: at most one supervisor pass at a time.
//!
//! The marker file is held under an exclusive `flock` for the whole pass and
//! removed when the guard drops. Like the override markers it carries no
//! content; stale bytes from an older writer are truncated. A pass that loses the race on a marker that
//! was unlinked between its `open` and its `flock` sees a different inode at
//! the path and backs off as if the lock were held.

use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors while taking the run lock.
#[derive(Debug, Error)]
pub enum LockError {
    /// The marker file could not be created or opened.
    #[error("Failed to open run lock {path}: {source}")]
    Open {
        /// Marker path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Locking failed for a reason other than contention.
    #[error("Failed to lock {path}: {source}")]
    Lock {
        /// Marker path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },
}

/// Exclusive lock over a marker file.
#[derive(Debug, Clone)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Lock over the marker at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Marker path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Take the lock without blocking. `Ok(None)` means another pass holds it.
    pub fn try_acquire(&self) -> Result<Option<RunLockGuard>, LockError> {
        let open_error = |source| LockError::Open {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(open_error)?;
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .map_err(open_error)?;

        if let Err(e) = file.try_lock_exclusive() {
            if e.kind() == fs2::lock_contended_error().kind() {
                debug!("Run lock {} held by another pass", self.path.display());
                return Ok(None);
            }
            return Err(LockError::Lock {
                path: self.path.clone(),
                source: e,
            });
        }

        if !self.still_linked(&file) {
            debug!("Run lock {} was replaced while locking", self.path.display());
            return Ok(None);
        }

        if let Err(e) = file.set_len(0) {
            warn!("Cannot truncate {}: {}", self.path.display(), e);
        }

        debug!("Acquired run lock {}", self.path.display());
        Ok(Some(RunLockGuard {
            file,
            path: self.path.clone(),
        }))
    }

    fn still_linked(&self, file: &File) -> bool {
        match (file.metadata(), fs::metadata(&self.path)) {
            (Ok(held), Ok(current)) => held.dev() == current.dev() && held.ino() == current.ino(),
            _ => false,
        }
    }
}

/// Held run lock. Dropping it removes the marker and releases the lock.
#[derive(Debug)]
pub struct RunLockGuard {
    file: File,
    path: PathBuf,
}

impl Drop for RunLockGuard {
    fn drop(&mut self) {
        // Unlink while still holding the lock so no one locks a doomed inode
        if let Err(e) = fs::remove_file(&self.path)
            && e.kind() != io::ErrorKind::NotFound
        {
            warn!("Failed to remove run lock {}: {}", self.path.display(), e);
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            debug!("Failed to unlock {}: {}", self.path.display(), e);
        }
        debug!("Released run lock {}", self.path.display());
    }
}
