//! Outbound address detection and TCP reachability checks.

use std::net::{Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket};
use std::time::Duration;
use tracing::{debug, trace};

use super::NetworkProbe;

/// Routable address used to select the outbound interface. No packet is sent.
pub const ROUTE_PROBE_ADDR: &str = "8.8.8.8:80";

/// Network probe backed by real sockets.
#[derive(Debug, Clone)]
pub struct SystemNetwork {
    connect_timeout: Duration,
}

impl SystemNetwork {
    /// Create a probe using `connect_timeout` for every TCP check.
    #[must_use]
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

impl Default for SystemNetwork {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl NetworkProbe for SystemNetwork {
    fn outbound_address(&self) -> Ipv4Addr {
        match route_source_address(ROUTE_PROBE_ADDR) {
            Some(addr) => {
                trace!("Outbound address is {}", addr);
                addr
            }
            None => {
                debug!("No outbound route, falling back to loopback");
                Ipv4Addr::LOCALHOST
            }
        }
    }

    fn is_port_open(&self, host: &str, port: u16) -> bool {
        tcp_connects(host, port, self.connect_timeout)
    }

    fn can_reach(&self, host: &str, port: u16) -> bool {
        tcp_connects(host, port, self.connect_timeout)
    }
}

/// Local IPv4 address the kernel would use to reach `target`.
///
/// Connecting a UDP socket only performs route selection; it does not send.
fn route_source_address(target: &str) -> Option<Ipv4Addr> {
    let socket = UdpSocket::bind("0.0.0.0:0").ok()?;
    socket.connect(target).ok()?;
    match socket.local_addr().ok()? {
        SocketAddr::V4(local) if !local.ip().is_unspecified() => Some(*local.ip()),
        _ => None,
    }
}

/// Whether any address `host` resolves to accepts a TCP connection on `port`.
fn tcp_connects(host: &str, port: u16, timeout: Duration) -> bool {
    let addrs = match (host, port).to_socket_addrs() {
        Ok(addrs) => addrs,
        Err(e) => {
            debug!("Cannot resolve {}: {}", host, e);
            return false;
        }
    };

    for addr in addrs {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(_) => {
                trace!("{} accepts connections", addr);
                return true;
            }
            Err(e) => trace!("{} not reachable: {}", addr, e),
        }
    }
    false
}
