//! Run a command, then confirm the process it manages reached the expected state.
//!
//! # Stop verification
//!
//! After a stop command the launcher performs a fixed number of liveness checks.
//! How those checks are read is configurable through [`StopCheck`]:
//!
//! - `still-running`: the check succeeds as soon as the process is seen running
//!   and fails if it is never seen. This is how the tool has always behaved; it
//!   confirms the stop command did not take the client down abruptly, and the
//!   caller then waits for the network identity to change.
//! - `exited`: the check succeeds as soon as the process is seen gone.

use std::path::Path;
use tracing::{debug, info, warn};

use super::{split_command, CommandExecutor};
use crate::clock::Clock;
use crate::config::{PollingConfig, StopCheck};
use crate::finding::Finding;
use crate::probe::ProcessProbe;

/// Process state expected after running a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expectation {
    /// The command starts the process.
    Started,
    /// The command stops the process.
    Stopped,
}

/// Command runner with post-run process verification.
pub struct Launcher<'a> {
    executor: &'a dyn CommandExecutor,
    processes: &'a dyn ProcessProbe,
    clock: &'a dyn Clock,
    polling: &'a PollingConfig,
}

impl<'a> Launcher<'a> {
    /// Create a launcher from its collaborators.
    pub fn new(
        executor: &'a dyn CommandExecutor,
        processes: &'a dyn ProcessProbe,
        clock: &'a dyn Clock,
        polling: &'a PollingConfig,
    ) -> Self {
        Self {
            executor,
            processes,
            clock,
            polling,
        }
    }

    /// Process probe used for verification.
    pub fn processes(&self) -> &'a dyn ProcessProbe {
        self.processes
    }

    /// Clock used for polling.
    pub fn clock(&self) -> &'a dyn Clock {
        self.clock
    }

    /// Polling configuration.
    pub fn polling(&self) -> &'a PollingConfig {
        self.polling
    }

    /// Run a configured command line (program followed by arguments).
    pub fn run_and_verify(&self, command: &[String], process: &str, expectation: Expectation) -> Finding {
        match split_command(command) {
            Ok((program, args)) => self.launch(program, args, process, expectation),
            Err(e) => Finding::failed(e.to_string()),
        }
    }

    /// Run `program` and verify `process` afterwards.
    pub fn launch(&self, program: &Path, args: &[String], process: &str, expectation: Expectation) -> Finding {
        if let Err(e) = self.executor.run(program, args) {
            warn!("Command failed: {}", e);
            return Finding::failed(e.to_string());
        }

        match expectation {
            Expectation::Started => self.verify_started(process),
            Expectation::Stopped => self.verify_stopped(process),
        }
    }

    fn verify_started(&self, process: &str) -> Finding {
        debug!("Checking that {} is running", process);
        let waited = self.polling.wait_policy().wait_until(
            self.clock,
            &format!("{} to start", process),
            || self.processes.is_running(process),
        );
        match waited {
            Ok(checks) => {
                info!("{} running after {} check(s)", process, checks);
                Finding::verified(true)
            }
            Err(e) => {
                warn!("{}", e);
                Finding::failed(e.to_string())
            }
        }
    }

    fn verify_stopped(&self, process: &str) -> Finding {
        let policy = self.polling.stop_policy();
        let verdict = match self.polling.stop_check {
            StopCheck::StillRunning => {
                debug!("Checking that {} is still running", process);
                policy.wait_until(self.clock, &format!("{} to be seen running", process), || {
                    self.processes.is_running(process)
                })
            }
            StopCheck::Exited => {
                debug!("Checking that {} has exited", process);
                policy.wait_until(self.clock, &format!("{} to exit", process), || {
                    !self.processes.is_running(process)
                })
            }
        };
        match verdict {
            Ok(_) => Finding::verified(true),
            Err(e) => {
                debug!("{}", e);
                Finding::verified(false)
            }
        }
    }
}
