//! Error types for external command execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from running an external command.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The command line was empty.
    #[error("Empty command")]
    Empty,

    /// The program could not be started.
    #[error("Failed to spawn {program}: {source}")]
    SpawnFailed {
        /// Program that failed to start.
        program: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The program ran and exited unsuccessfully.
    #[error("{program} exited with {status}: {stderr}")]
    ExitError {
        /// Program that failed.
        program: PathBuf,
        /// Exit status description.
        status: String,
        /// Standard error output.
        stderr: String,
    },
}
