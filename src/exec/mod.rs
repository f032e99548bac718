//! External command execution.
//!
//! The VPN client and the daemon are started and stopped by running external
//! programs. [`CommandExecutor`] runs one program to completion; [`Launcher`]
//! adds the post-run liveness verification through a process probe.

mod error;
pub mod launcher;

use std::path::Path;
use std::process::Command;
use tracing::{debug, info};

pub use error::CommandError;
pub use launcher::{Expectation, Launcher};

/// Runs external programs synchronously.
pub trait CommandExecutor {
    /// Run `program` with `args` to completion. Success means exit status 0.
    fn run(&self, program: &Path, args: &[String]) -> Result<(), CommandError>;
}

/// Split a configured command line into program and arguments.
pub fn split_command(command: &[String]) -> Result<(&Path, &[String]), CommandError> {
    let (program, args) = command.split_first().ok_or(CommandError::Empty)?;
    Ok((Path::new(program), args))
}

/// Executor that spawns real processes.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl CommandExecutor for SystemExecutor {
    fn run(&self, program: &Path, args: &[String]) -> Result<(), CommandError> {
        info!("Launching {} {}", program.display(), args.join(" "));

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|source| CommandError::SpawnFailed {
                program: program.to_path_buf(),
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(CommandError::ExitError {
                program: program.to_path_buf(),
                status: output.status.to_string(),
                stderr,
            });
        }

        debug!("{} completed", program.display());
        Ok(())
    }
}
