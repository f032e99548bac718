//! One supervisor pass.
//!
//! ```text
//! run lock ─► storage ─► decide ─► tunnel.ensure ─► daemon.reconcile
//!     │           │
//!     └ held      └ missing: log, audit, optionally stop the daemon, done
//! ```
//!
//! The run lock is held by a guard for the whole pass, so every return path
//! releases it.

use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::{info, warn};

use crate::activity::ActivityEvaluator;
use crate::clock::Clock;
use crate::config::Config;
use crate::decision::{Decision, StateDecisionEngine};
use crate::exec::{CommandExecutor, Launcher};
use crate::lock::{LockError, RunLock};
use crate::probe::{NetworkProbe, ProcessProbe};
use crate::reconcile::{DaemonReconciler, ReconcileOutcome};
use crate::rpc::TransferClient;
use crate::storage;
use crate::telemetry::{AuditEvent, AuditLogger, PassOutcome};
use crate::tunnel::TunnelManager;

/// The host-facing collaborators of a pass.
#[derive(Clone, Copy)]
pub struct Host<'a> {
    /// Wall clock and sleeper.
    pub clock: &'a dyn Clock,
    /// Process lookup.
    pub processes: &'a dyn ProcessProbe,
    /// Outbound address and port probes.
    pub network: &'a dyn NetworkProbe,
    /// External command runner.
    pub executor: &'a dyn CommandExecutor,
    /// Daemon RPC client.
    pub client: &'a dyn TransferClient,
}

/// Result of one pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassReport {
    /// Another pass holds the run lock; nothing was done.
    Locked,
    /// Required storage is missing; the tunnel was not touched.
    StorageUnavailable {
        /// Missing paths.
        missing: Vec<PathBuf>,
        /// Daemon shutdown outcome, when configured to stop it.
        daemon: Option<ReconcileOutcome>,
    },
    /// The pass ran to completion.
    Completed {
        /// The state decision.
        decision: Decision,
        /// Address the daemon was reconciled against.
        address: Ipv4Addr,
        /// What the reconciler did.
        reconcile: ReconcileOutcome,
    },
}

impl PassReport {
    fn outcome(&self) -> PassOutcome {
        match self {
            PassReport::Locked => PassOutcome::Locked,
            PassReport::StorageUnavailable { .. } => PassOutcome::StorageUnavailable,
            PassReport::Completed { .. } => PassOutcome::Completed,
        }
    }
}

impl fmt::Display for PassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PassReport::Locked => f.write_str("another pass is running"),
            PassReport::StorageUnavailable { missing, daemon } => {
                let paths: Vec<String> = missing.iter().map(|p| p.display().to_string()).collect();
                write!(f, "storage unavailable: {}", paths.join(", "))?;
                if let Some(daemon) = daemon {
                    write!(f, " (daemon {})", daemon)?;
                }
                Ok(())
            }
            PassReport::Completed {
                decision,
                address,
                reconcile,
            } => write!(f, "{}; daemon on {}: {}", decision, address, reconcile),
        }
    }
}

/// Runs supervisor passes against a configuration.
pub struct Supervisor<'a> {
    config: &'a Config,
    host: Host<'a>,
    audit: &'a AuditLogger,
}

impl<'a> Supervisor<'a> {
    /// Create a supervisor.
    pub fn new(config: &'a Config, host: Host<'a>, audit: &'a AuditLogger) -> Self {
        Self { config, host, audit }
    }

    /// Run one pass. Only failing to take the run lock is an error.
    pub fn run_pass(&self) -> Result<PassReport, LockError> {
        let started = self.host.clock.now();
        self.audit.log(AuditEvent::PassStart {
            pid: std::process::id(),
        });

        let report = {
            let lock = RunLock::new(&self.config.markers.run_lock);
            match lock.try_acquire()? {
                Some(_guard) => self.pass(),
                None => {
                    info!("Run lock {} held, skipping pass", lock.path().display());
                    PassReport::Locked
                }
            }
        };

        let elapsed = self.host.clock.now().signed_duration_since(started);
        self.audit.log(AuditEvent::PassEnd {
            outcome: report.outcome(),
            duration_sec: u64::try_from(elapsed.num_seconds()).unwrap_or(0),
        });
        info!("Pass finished: {}", report);
        Ok(report)
    }

    /// Evaluate the state decision without acting on it.
    pub fn preview(&self) -> Decision {
        let activity = ActivityEvaluator::new(self.host.client, self.host.clock, &self.config.trackers, self.audit)
            .dry_run(true);
        StateDecisionEngine::new(&self.config.markers, &self.config.schedule, self.host.clock, &activity).decide()
    }

    fn pass(&self) -> PassReport {
        let config = self.config;
        let host = self.host;
        let launcher = Launcher::new(host.executor, host.processes, host.clock, &config.polling);
        let reconciler = DaemonReconciler::new(&config.daemon, &launcher, host.network, host.client, self.audit);

        let missing = storage::missing_paths(&config.storage);
        if !missing.is_empty() {
            for path in &missing {
                warn!("Required storage {} missing", path.display());
            }
            let daemon = config.storage.stop_daemon_when_missing.then(|| {
                info!("Stopping daemon until storage returns");
                reconciler.shut_down()
            });
            self.audit.log(AuditEvent::StorageMissing {
                paths: missing.iter().map(|p| p.display().to_string()).collect(),
                daemon_stopped: daemon == Some(ReconcileOutcome::Stopped),
            });
            return PassReport::StorageUnavailable { missing, daemon };
        }

        let activity = ActivityEvaluator::new(host.client, host.clock, &config.trackers, self.audit);
        let decision = StateDecisionEngine::new(&config.markers, &config.schedule, host.clock, &activity).decide();
        self.audit.log(AuditEvent::StateDecided {
            state: decision.state,
            time_ok: decision.time_ok.as_ref().map(|f| f.value()),
            activity: decision.activity.as_ref().map(|f| f.value()),
        });

        let online = decision.state.wants_online();
        let tunnel = TunnelManager::new(&config.vpn, &launcher, host.network, self.audit);
        let tunnel_address = tunnel.ensure(online);

        // Never bind to the clear-net address when a kill-switch address exists
        let address = match config.vpn.offline_bind_address {
            Some(offline) if tunnel_address == config.vpn.baseline() => offline,
            _ => tunnel_address,
        };
        let reconcile = reconciler.reconcile(address);
        if let ReconcileOutcome::Incomplete { stage, .. } = &reconcile {
            self.audit.log(AuditEvent::DaemonIncomplete { address, stage: *stage });
        }

        PassReport::Completed {
            decision,
            address,
            reconcile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MarkersConfig, VpnConfig};
    use crate::decision::SystemState;
    use crate::finding::Finding;
    use crate::rpc::{Transfer, TransferStatus};
    use crate::testing::{transfer, FakeClock, FakeProcesses, FakeTransfers, RecordingExecutor, ScriptedNetwork};
    use std::fs;
    use tempfile::TempDir;

    const BASELINE: Ipv4Addr = Ipv4Addr::new(192, 168, 1, 10);
    const TUNNEL: Ipv4Addr = Ipv4Addr::new(10, 8, 0, 2);

    fn config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.markers = MarkersConfig {
            force_stop: dir.path().join("force-stop"),
            force_start: dir.path().join("force-start"),
            run_lock: dir.path().join("run.lock"),
        };
        config.storage.required_paths = vec![dir.path().to_path_buf()];
        config.vpn = VpnConfig {
            start_command: vec!["/usr/bin/vpn".to_string(), "up".to_string()],
            stop_command: vec!["/usr/bin/vpn".to_string(), "down".to_string()],
            baseline_address: Some(BASELINE),
            ..Default::default()
        };
        config
    }

    struct Fixture {
        clock: FakeClock,
        processes: FakeProcesses,
        network: ScriptedNetwork,
        executor: RecordingExecutor,
        client: FakeTransfers,
        audit: AuditLogger,
    }

    impl Fixture {
        fn new(network: ScriptedNetwork, client: FakeTransfers) -> Self {
            Self {
                clock: FakeClock::weekday_noon(),
                processes: FakeProcesses::new().with_running("openvpn", 42),
                network,
                executor: RecordingExecutor::succeeding(),
                client,
                audit: AuditLogger::new_null(),
            }
        }

        fn run(&self, config: &Config) -> PassReport {
            let host = Host {
                clock: &self.clock,
                processes: &self.processes,
                network: &self.network,
                executor: &self.executor,
                client: &self.client,
            };
            Supervisor::new(config, host, &self.audit).run_pass().unwrap()
        }
    }

    #[test]
    fn test_forced_offline_at_baseline() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        fs::write(&config.markers.force_stop, "").unwrap();
        let f = Fixture::new(
            ScriptedNetwork::at(BASELINE).ports(&[true]),
            FakeTransfers::new(vec![transfer(1, TransferStatus::Downloading)]),
        );

        let report = f.run(&config);

        match report {
            PassReport::Completed {
                decision,
                address,
                reconcile,
            } => {
                assert_eq!(decision.state, SystemState::ForcedOffline);
                assert_eq!(address, BASELINE);
                assert_eq!(reconcile, ReconcileOutcome::AlreadyBound);
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
        assert!(f.executor.calls().is_empty());
        assert_eq!(f.network.port_checks(), vec![("192.168.1.10".to_string(), 9091)]);
        assert_eq!(f.client.lists(), 0);
    }

    #[test]
    fn test_downloading_in_window_goes_online() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let f = Fixture::new(
            ScriptedNetwork::at(BASELINE).outbound(&[BASELINE, TUNNEL]).ports(&[true]),
            FakeTransfers::new(vec![transfer(1, TransferStatus::Downloading)]),
        );

        let report = f.run(&config);

        match report {
            PassReport::Completed { decision, address, .. } => {
                assert_eq!(decision.state, SystemState::ShouldBeOnline);
                assert_eq!(decision.time_ok, Some(Finding::verified(true)));
                assert_eq!(decision.activity, Some(Finding::verified(true)));
                assert_eq!(address, TUNNEL);
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
        let calls = f.executor.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec!["up"]);
        assert_eq!(f.network.port_checks(), vec![("10.8.0.2".to_string(), 9091)]);
    }

    #[test]
    fn test_missing_storage_skips_management() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.storage.required_paths.push(dir.path().join("media"));
        let f = Fixture::new(
            ScriptedNetwork::at(BASELINE),
            FakeTransfers::new(vec![transfer(1, TransferStatus::Downloading)]),
        );

        let report = f.run(&config);

        assert_eq!(
            report,
            PassReport::StorageUnavailable {
                missing: vec![dir.path().join("media")],
                daemon: None,
            }
        );
        assert_eq!(f.network.outbound_samples(), 0);
        assert!(f.network.port_checks().is_empty());
        assert!(f.executor.calls().is_empty());
        assert_eq!(f.client.lists(), 0);
        assert_eq!(f.client.closes(), 0);
    }

    #[test]
    fn test_never_completed_transfer_resumed() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let incomplete = Transfer {
            upload_ratio: 0.5,
            ..transfer(12, TransferStatus::Stopped)
        };
        let f = Fixture::new(
            ScriptedNetwork::at(BASELINE).outbound(&[BASELINE, TUNNEL]).ports(&[true]),
            FakeTransfers::new(vec![incomplete]),
        );

        let report = f.run(&config);

        assert_eq!(f.client.started(), vec![vec![12]]);
        match report {
            PassReport::Completed { decision, .. } => {
                assert_eq!(decision.state, SystemState::ShouldBeOnline);
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_held_lock_skips_pass() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let _held = RunLock::new(&config.markers.run_lock).try_acquire().unwrap().unwrap();
        let f = Fixture::new(ScriptedNetwork::at(BASELINE), FakeTransfers::new(vec![]));

        assert_eq!(f.run(&config), PassReport::Locked);
        assert_eq!(f.network.outbound_samples(), 0);
        assert!(config.markers.run_lock.exists());
    }

    #[test]
    fn test_lock_released_after_pass() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let f = Fixture::new(ScriptedNetwork::at(BASELINE).ports(&[true]), FakeTransfers::new(vec![]));

        f.run(&config);

        assert!(!config.markers.run_lock.exists());
        assert!(RunLock::new(&config.markers.run_lock).try_acquire().unwrap().is_some());
    }

    #[test]
    fn test_offline_bind_address() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.vpn.offline_bind_address = Some(Ipv4Addr::LOCALHOST);
        let f = Fixture::new(ScriptedNetwork::at(BASELINE).ports(&[true]), FakeTransfers::new(vec![]));

        let report = f.run(&config);

        match report {
            PassReport::Completed { decision, address, .. } => {
                assert_eq!(decision.state, SystemState::ShouldBeOffline);
                assert_eq!(address, Ipv4Addr::LOCALHOST);
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
        assert_eq!(f.network.port_checks()[0].0, "127.0.0.1");
    }

    #[test]
    fn test_failed_start_uses_offline_bind_address() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.vpn.offline_bind_address = Some(Ipv4Addr::LOCALHOST);
        let mut f = Fixture::new(
            ScriptedNetwork::at(BASELINE).ports(&[true]),
            FakeTransfers::new(vec![transfer(1, TransferStatus::Downloading)]),
        );
        f.executor = RecordingExecutor::failing();

        let report = f.run(&config);

        match report {
            PassReport::Completed { decision, address, reconcile } => {
                assert_eq!(decision.state, SystemState::ShouldBeOnline);
                assert_eq!(address, Ipv4Addr::LOCALHOST);
                assert_eq!(reconcile, ReconcileOutcome::AlreadyBound);
            }
            other => panic!("Expected Completed, got {:?}", other),
        }
        assert_eq!(f.executor.calls().len(), 1);
        assert_eq!(f.network.port_checks(), vec![("127.0.0.1".to_string(), 9091)]);
    }

    #[test]
    fn test_failed_start_without_offline_address_binds_baseline() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut f = Fixture::new(
            ScriptedNetwork::at(BASELINE).ports(&[true]),
            FakeTransfers::new(vec![transfer(1, TransferStatus::Downloading)]),
        );
        f.executor = RecordingExecutor::failing();

        match f.run(&config) {
            PassReport::Completed { address, .. } => assert_eq!(address, BASELINE),
            other => panic!("Expected Completed, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_storage_can_stop_daemon() {
        let dir = TempDir::new().unwrap();
        let mut config = config(&dir);
        config.storage.required_paths = vec![dir.path().join("media")];
        config.storage.stop_daemon_when_missing = true;
        let f = Fixture::new(ScriptedNetwork::at(BASELINE), FakeTransfers::new(vec![]));

        let report = f.run(&config);

        assert_eq!(
            report,
            PassReport::StorageUnavailable {
                missing: vec![dir.path().join("media")],
                daemon: Some(ReconcileOutcome::Stopped),
            }
        );
        assert_eq!(f.client.closes(), 1);
        assert_eq!(f.network.outbound_samples(), 0);
    }

    #[test]
    fn test_preview_does_not_act() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let f = Fixture::new(
            ScriptedNetwork::at(BASELINE),
            FakeTransfers::new(vec![transfer(5, TransferStatus::Stopped)]),
        );
        let host = Host {
            clock: &f.clock,
            processes: &f.processes,
            network: &f.network,
            executor: &f.executor,
            client: &f.client,
        };

        let decision = Supervisor::new(&config, host, &f.audit).preview();

        assert_eq!(decision.state, SystemState::ShouldBeOnline);
        assert!(f.client.started().is_empty());
        assert!(f.executor.calls().is_empty());
        assert!(!config.markers.run_lock.exists());
    }
}
