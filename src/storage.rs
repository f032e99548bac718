//! Required storage presence check.

use std::path::PathBuf;
use tracing::debug;

use crate::config::StorageConfig;

/// Required paths that do not currently exist.
pub fn missing_paths(storage: &StorageConfig) -> Vec<PathBuf> {
    storage
        .required_paths
        .iter()
        .filter(|path| {
            let present = path.exists();
            debug!("Required path {}: {}", path.display(), if present { "present" } else { "missing" });
            !present
        })
        .cloned()
        .collect()
}
