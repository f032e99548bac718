//! Keep the daemon bound to the current network identity.
//!
//! A daemon whose RPC port answers on the desired address is left alone.
//! Otherwise it is rebound: close its session, wait for the process to exit,
//! relaunch it on the desired address and wait until its RPC port accepts
//! connections again.

use serde::Serialize;
use std::fmt;
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

use crate::clock::PollExhausted;
use crate::config::DaemonConfig;
use crate::exec::{Expectation, Launcher};
use crate::probe::NetworkProbe;
use crate::rpc::TransferClient;
use crate::telemetry::{AuditEvent, AuditLogger};

/// Step of a rebind that did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileStage {
    /// Waiting for the old daemon process to exit.
    ProcessExit,
    /// Relaunching the daemon.
    Relaunch,
    /// Waiting for the RPC port to accept connections.
    Readiness,
}

impl fmt::Display for ReconcileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReconcileStage::ProcessExit => "process exit",
            ReconcileStage::Relaunch => "relaunch",
            ReconcileStage::Readiness => "readiness",
        };
        f.write_str(name)
    }
}

/// What the reconciler did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The daemon already answered on the desired address.
    AlreadyBound,
    /// The daemon was restarted on the desired address and is ready.
    Rebound,
    /// The daemon was shut down.
    Stopped,
    /// A bounded wait ran out.
    Incomplete {
        /// Step that gave up.
        stage: ReconcileStage,
        /// Why it gave up.
        reason: String,
    },
}

impl ReconcileOutcome {
    fn incomplete(stage: ReconcileStage, exhausted: PollExhausted) -> Self {
        warn!("Daemon {} incomplete: {}", stage, exhausted);
        ReconcileOutcome::Incomplete {
            stage,
            reason: exhausted.to_string(),
        }
    }
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconcileOutcome::AlreadyBound => f.write_str("already bound"),
            ReconcileOutcome::Rebound => f.write_str("rebound"),
            ReconcileOutcome::Stopped => f.write_str("stopped"),
            ReconcileOutcome::Incomplete { stage, reason } => write!(f, "incomplete at {}: {}", stage, reason),
        }
    }
}

/// Rebinds or stops the daemon.
pub struct DaemonReconciler<'a> {
    daemon: &'a DaemonConfig,
    launcher: &'a Launcher<'a>,
    network: &'a dyn NetworkProbe,
    client: &'a dyn TransferClient,
    audit: &'a AuditLogger,
}

impl<'a> DaemonReconciler<'a> {
    /// Create a reconciler.
    pub fn new(
        daemon: &'a DaemonConfig,
        launcher: &'a Launcher<'a>,
        network: &'a dyn NetworkProbe,
        client: &'a dyn TransferClient,
        audit: &'a AuditLogger,
    ) -> Self {
        Self {
            daemon,
            launcher,
            network,
            client,
            audit,
        }
    }

    /// Make sure the daemon answers on `desired`.
    pub fn reconcile(&self, desired: Ipv4Addr) -> ReconcileOutcome {
        let port = self.daemon.rpc_port;
        if self.network.is_port_open(&desired.to_string(), port) {
            info!("Daemon bound to {}:{}", desired, port);
            return ReconcileOutcome::AlreadyBound;
        }

        info!("Daemon not bound to {}:{}, rebinding", desired, port);
        if let Err(e) = self.stop() {
            return ReconcileOutcome::incomplete(ReconcileStage::ProcessExit, e);
        }

        let args = self.daemon.launch_args(desired);
        let policy = self.launcher.polling().wait_policy();
        let launched = policy.wait_until(self.launcher.clock(), "daemon relaunch", || {
            let finding =
                self.launcher
                    .launch(&self.daemon.binary, &args, &self.daemon.process_name, Expectation::Started);
            if !finding.value() {
                warn!("Daemon launch failed: {}", finding);
            }
            finding.value()
        });
        if let Err(e) = launched {
            return ReconcileOutcome::incomplete(ReconcileStage::Relaunch, e);
        }
        info!("Daemon launched, waiting for RPC interface");

        let ready = policy.wait_until(self.launcher.clock(), "daemon RPC port", || {
            self.network.is_port_open(&self.daemon.rpc_host, port)
        });
        if let Err(e) = ready {
            return ReconcileOutcome::incomplete(ReconcileStage::Readiness, e);
        }

        info!("Daemon ready on {}", desired);
        self.audit.log(AuditEvent::DaemonRebound { address: desired });
        ReconcileOutcome::Rebound
    }

    /// Close the daemon's session and wait for it to exit.
    pub fn shut_down(&self) -> ReconcileOutcome {
        match self.stop() {
            Ok(()) => ReconcileOutcome::Stopped,
            Err(e) => ReconcileOutcome::incomplete(ReconcileStage::ProcessExit, e),
        }
    }

    fn stop(&self) -> Result<(), PollExhausted> {
        if let Err(e) = self.client.close_session() {
            debug!("Session close failed, ignoring: {}", e);
        }

        let name = &self.daemon.process_name;
        let processes = self.launcher.processes();
        self.launcher
            .polling()
            .wait_policy()
            .wait_until(self.launcher.clock(), "daemon to exit", || !processes.is_running(name))?;
        debug!("Daemon process gone");
        Ok(())
    }
}
