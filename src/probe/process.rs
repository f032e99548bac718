//! Process lookup through `/proc`.
//!
//! A process is identified by its resolved executable path, read from the
//! `/proc/<pid>/exe` symlink.
//!
//! Kernel threads and processes owned by other users make `readlink` fail; they
//! are skipped, not reported.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use super::ProcessProbe;

/// Default process directory.
pub const PROC_ROOT: &str = "/proc";

/// Process probe that scans a procfs directory.
#[derive(Debug, Clone)]
pub struct ProcFs {
    root: PathBuf,
}

impl ProcFs {
    /// Probe the real `/proc`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_root(PROC_ROOT)
    }

    /// Probe an alternative process directory (for testing).
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The process directory being scanned.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Default for ProcFs {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessProbe for ProcFs {
    fn find(&self, name: &str) -> Option<u32> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!("Cannot read {:?}: {}", self.root, e);
                return None;
            }
        };

        // Sort so that lookups are deterministic when several processes match
        let mut pids: Vec<u32> = entries
            .flatten()
            .filter_map(|entry| entry.file_name().to_str()?.parse::<u32>().ok())
            .collect();
        pids.sort_unstable();

        for pid in pids {
            let exe = self.root.join(pid.to_string()).join("exe");
            let target = match fs::read_link(&exe) {
                Ok(target) => target,
                Err(e) => {
                    trace!("Skipping PID {}: {}", pid, e);
                    continue;
                }
            };
            if target.to_string_lossy().contains(name) {
                debug!("PID of {} is {} ({:?})", name, pid, target);
                return Some(pid);
            }
        }

        None
    }
}
