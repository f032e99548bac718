//! seedbox-warden: keep a torrent daemon bound to the right VPN identity.
//!
//! A supervisor for a machine that toggles a VPN connection and a Transmission
//! daemon based on schedule, disk availability and transfer activity. Each
//! invocation runs one pass and exits.
//!
//! # Architecture
//!
//! - **Probes**: process lookup through `/proc`, outbound address and TCP probes
//! - **Exec**: external commands with post-run liveness verification
//! - **Tunnel**: VPN start/stop/restart inferred from the outbound address
//! - **Activity**: transfer statistics and forced resume over the daemon's RPC
//! - **Decision**: override markers, schedule and activity into a system state
//! - **Reconcile**: rebinding the daemon to the current address
//! - **Supervisor**: one pass under an exclusive run lock
//! - **Config**: hierarchical TOML configuration
//! - **Telemetry**: structured syslog audit trail
//!
//! Every wait is a poll through an injectable [`clock::Clock`], unbounded by
//! default and bounded when `polling.max_checks` is configured.

#![warn(clippy::all)]
#![warn(missing_docs)]

pub mod activity;
pub mod cli;
pub mod cli_handler;
pub mod clock;
pub mod config;
pub mod decision;
pub mod exec;
pub mod finding;
pub mod lock;
pub mod probe;
pub mod reconcile;
pub mod rpc;
pub mod schedule;
pub mod storage;
pub mod supervisor;
pub mod telemetry;
pub mod tunnel;

#[cfg(test)]
pub(crate) mod testing;
