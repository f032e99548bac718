//! VPN tunnel management.
//!
//! The tunnel state is never stored: it is inferred each time by comparing the
//! current outbound address with the configured baseline (the address traffic
//! leaves from when no tunnel is active).

use std::net::Ipv4Addr;
use tracing::{error, info, warn};

use crate::config::VpnConfig;
use crate::exec::{Expectation, Launcher};
use crate::probe::NetworkProbe;
use crate::telemetry::{AuditEvent, AuditLogger};

/// Drives the VPN client towards the desired state.
pub struct TunnelManager<'a> {
    vpn: &'a VpnConfig,
    launcher: &'a Launcher<'a>,
    network: &'a dyn NetworkProbe,
    audit: &'a AuditLogger,
}

impl<'a> TunnelManager<'a> {
    /// Create a manager.
    pub fn new(
        vpn: &'a VpnConfig,
        launcher: &'a Launcher<'a>,
        network: &'a dyn NetworkProbe,
        audit: &'a AuditLogger,
    ) -> Self {
        Self {
            vpn,
            launcher,
            network,
            audit,
        }
    }

    /// Whether outbound traffic currently leaves through the tunnel.
    pub fn is_up(&self) -> bool {
        self.network.outbound_address() != self.vpn.baseline()
    }

    /// Bring the tunnel to the desired state and return the resulting address.
    pub fn ensure(&self, online: bool) -> Ipv4Addr {
        let baseline = self.vpn.baseline();
        let current = self.network.outbound_address();
        let up = current != baseline;

        match (online, up) {
            (true, true) => {
                if self.is_healthy() {
                    info!("Tunnel up at {}", current);
                    current
                } else {
                    warn!("Tunnel at {} is not healthy, restarting", current);
                    self.restart()
                }
            }
            (true, false) => self.start(),
            (false, true) => self.stop(),
            (false, false) => {
                info!("Tunnel already down at {}", baseline);
                baseline
            }
        }
    }

    /// Start the VPN client and wait for the outbound address to leave the baseline.
    pub fn start(&self) -> Ipv4Addr {
        let baseline = self.vpn.baseline();
        info!("Starting VPN");

        let started =
            self.launcher
                .run_and_verify(&self.vpn.start_command, &self.vpn.process_name, Expectation::Started);
        if !started.value() {
            error!("VPN start failed: {}", started);
            return baseline;
        }

        let mut address = baseline;
        let waited = self.launcher.polling().wait_policy().wait_until(
            self.launcher.clock(),
            "outbound address to change",
            || {
                address = self.network.outbound_address();
                address != baseline
            },
        );
        match waited {
            Ok(_) => {
                info!("Tunnel established at {}", address);
                self.audit.log(AuditEvent::TunnelTransition {
                    online: true,
                    address,
                });
                address
            }
            Err(e) => {
                warn!("{}", e);
                baseline
            }
        }
    }

    /// Stop the VPN client and wait for the outbound address to return to the baseline.
    pub fn stop(&self) -> Ipv4Addr {
        let baseline = self.vpn.baseline();
        info!("Stopping VPN");

        let stopped =
            self.launcher
                .run_and_verify(&self.vpn.stop_command, &self.vpn.process_name, Expectation::Stopped);
        if !stopped.value() {
            error!("VPN stop could not be verified: {}", stopped);
            return baseline;
        }

        let waited = self.launcher.polling().wait_policy().wait_until(
            self.launcher.clock(),
            "outbound address to return to baseline",
            || self.network.outbound_address() == baseline,
        );
        match waited {
            Ok(_) => {
                info!("Tunnel down, back at {}", baseline);
                self.audit.log(AuditEvent::TunnelTransition {
                    online: false,
                    address: baseline,
                });
            }
            Err(e) => warn!("{}", e),
        }
        baseline
    }

    /// Stop then start. Returns the address after the start.
    pub fn restart(&self) -> Ipv4Addr {
        self.stop();
        self.start()
    }

    /// VPN process alive and the probe target reachable through the tunnel.
    fn is_healthy(&self) -> bool {
        if !self.launcher.processes().is_running(&self.vpn.process_name) {
            warn!("VPN process {} not running", self.vpn.process_name);
            return false;
        }
        match self.vpn.probe() {
            Some((host, port)) => {
                let reachable = self.network.can_reach(host, port);
                if !reachable {
                    warn!("Probe target {} unreachable", self.vpn.probe_target);
                }
                reachable
            }
            None => true,
        }
    }
}
