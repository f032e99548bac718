//! Indirect observation of the host.
//!
//! The supervisor never talks to the VPN client or the daemon about their own
//! state. It looks at them from the outside:
//!
//! - [`ProcessProbe`]: is a program running (PID lookup)
//! - [`NetworkProbe`]: which address does outbound traffic leave from, and does
//!   a given host:port accept connections

pub mod network;
pub mod process;

use std::net::Ipv4Addr;

pub use network::SystemNetwork;
pub use process::ProcFs;

/// Looks up running processes.
pub trait ProcessProbe {
    /// PID of a running process whose executable path contains `name`.
    fn find(&self, name: &str) -> Option<u32>;

    /// Whether a process matching `name` is running.
    fn is_running(&self, name: &str) -> bool {
        self.find(name).is_some()
    }
}

/// Observes the host's network identity and reachability.
pub trait NetworkProbe {
    /// Current outbound IPv4 address (loopback when there is no route).
    fn outbound_address(&self) -> Ipv4Addr;

    /// Whether `host:port` accepts a TCP connection.
    fn is_port_open(&self, host: &str, port: u16) -> bool;

    /// Whether an external `host:port` is reachable through the current route.
    fn can_reach(&self, host: &str, port: u16) -> bool;
}
