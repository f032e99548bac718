//! Configuration schema definitions.
//!
//! This module defines the structure of the seedbox-warden configuration files.
//! Every section has working defaults except the VPN commands and the baseline
//! address, which describe the host and must come from a file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use super::error::ConfigError;
use crate::clock::PollPolicy;

/// Top-level configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// When the tunnel and daemon are allowed to run.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Storage that must be mounted before anything is managed.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Private tracker identification.
    #[serde(default)]
    pub trackers: TrackersConfig,

    /// Override and run-lock marker files.
    #[serde(default)]
    pub markers: MarkersConfig,

    /// Transmission daemon settings.
    #[serde(default)]
    pub daemon: DaemonConfig,

    /// VPN client settings.
    #[serde(default)]
    pub vpn: VpnConfig,

    /// Polling behaviour for every wait loop.
    #[serde(default)]
    pub polling: PollingConfig,
}

impl Config {
    /// Merge another config into this one.
    ///
    /// Lists (required paths, private trackers, extra args) are merged (appended).
    /// Scalars are overridden when the other value differs from its default.
    pub fn merge(&mut self, other: Config) {
        self.schedule.merge(other.schedule);
        self.storage.merge(other.storage);
        self.trackers.merge(other.trackers);
        self.markers.merge(other.markers);
        self.daemon.merge(other.daemon);
        self.vpn.merge(other.vpn);
        self.polling.merge(other.polling);
    }

    /// Copy of the configuration that is safe to print.
    #[must_use]
    pub fn redacted(&self) -> Config {
        let mut config = self.clone();
        if config.daemon.password.is_some() {
            config.daemon.password = Some(REDACTED.to_string());
        }
        config
    }

    /// Check the merged configuration for values the supervisor cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, window) in [
            ("schedule.weekday.start", &self.schedule.weekday),
            ("schedule.weekend.start", &self.schedule.weekend),
        ] {
            if window.start == ClockTime::END_OF_DAY {
                return Err(ConfigError::invalid(field, "24:00 is only valid as a stop time"));
            }
        }
        if self.vpn.start_command.is_empty() {
            return Err(ConfigError::invalid("vpn.start_command", "must not be empty"));
        }
        if self.vpn.stop_command.is_empty() {
            return Err(ConfigError::invalid("vpn.stop_command", "must not be empty"));
        }
        match self.vpn.baseline_address {
            None => {
                return Err(ConfigError::invalid(
                    "vpn.baseline_address",
                    "the non-VPN outbound address must be set",
                ));
            }
            Some(addr) if addr.is_unspecified() => {
                return Err(ConfigError::invalid("vpn.baseline_address", "must not be 0.0.0.0"));
            }
            Some(_) => {}
        }
        if split_target(&self.vpn.probe_target).is_none() {
            return Err(ConfigError::invalid(
                "vpn.probe_target",
                format!("expected host:port, got '{}'", self.vpn.probe_target),
            ));
        }
        if self.vpn.process_name.is_empty() {
            return Err(ConfigError::invalid("vpn.process_name", "must not be empty"));
        }
        if self.daemon.process_name.is_empty() {
            return Err(ConfigError::invalid("daemon.process_name", "must not be empty"));
        }
        if self.daemon.rpc_port == 0 {
            return Err(ConfigError::invalid("daemon.rpc_port", "must not be 0"));
        }
        if self.polling.interval_secs == 0 {
            return Err(ConfigError::invalid("polling.interval_secs", "must be at least 1"));
        }
        if self.polling.max_checks == Some(0) {
            return Err(ConfigError::invalid(
                "polling.max_checks",
                "must be at least 1 (omit it to poll without a bound)",
            ));
        }
        if self.polling.stop_checks == 0 {
            return Err(ConfigError::invalid("polling.stop_checks", "must be at least 1"));
        }
        Ok(())
    }
}

/// A time of day written as `HH:MM`. `24:00` stands for the end of the day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    /// The end of the day, usable as a window stop.
    pub const END_OF_DAY: ClockTime = ClockTime { hour: 24, minute: 0 };

    /// Build a time of day, returning `None` when out of range.
    #[must_use]
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        let valid = (hour < 24 && minute < 60) || (hour == 24 && minute == 0);
        valid.then_some(Self { hour, minute })
    }

    /// Minutes since midnight, 0 to 1440.
    pub fn minute_of_day(self) -> u32 {
        u32::from(self.hour) * 60 + u32::from(self.minute)
    }
}

impl TryFrom<String> for ClockTime {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let (hour, minute) = value
            .trim()
            .split_once(':')
            .ok_or_else(|| format!("invalid time '{}', expected HH:MM", value))?;
        let hour: u8 = hour
            .parse()
            .map_err(|_| format!("invalid hour in '{}'", value))?;
        let minute: u8 = minute
            .parse()
            .map_err(|_| format!("invalid minute in '{}'", value))?;
        ClockTime::new(hour, minute).ok_or_else(|| format!("time out of range: '{}'", value))
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// One daily time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct WindowConfig {
    /// Start of the window (inclusive).
    pub start: ClockTime,
    /// End of the window (exclusive). Earlier than `start` means it ends the next day;
    /// `24:00` closes it at midnight.
    pub stop: ClockTime,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            start: ClockTime { hour: 0, minute: 0 },
            stop: ClockTime::END_OF_DAY,
        }
    }
}

/// Weekday (Monday to Friday) and weekend windows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ScheduleConfig {
    /// Window applied Monday to Friday.
    #[serde(default)]
    pub weekday: WindowConfig,
    /// Window applied Saturday and Sunday.
    #[serde(default)]
    pub weekend: WindowConfig,
}

impl ScheduleConfig {
    fn merge(&mut self, other: ScheduleConfig) {
        let default = WindowConfig::default();
        if other.weekday != default {
            self.weekday = other.weekday;
        }
        if other.weekend != default {
            self.weekend = other.weekend;
        }
    }
}

/// Storage requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Paths that must exist (typically mount points) before a pass does anything.
    #[serde(default)]
    pub required_paths: Vec<PathBuf>,

    /// Stop the daemon when required storage is missing.
    ///
    /// Off by default: a pass with missing storage only logs and leaves the
    /// daemon as it is.
    #[serde(default)]
    pub stop_daemon_when_missing: bool,
}

impl StorageConfig {
    fn merge(&mut self, other: StorageConfig) {
        self.required_paths.extend(other.required_paths);
        if other.stop_daemon_when_missing {
            self.stop_daemon_when_missing = true;
        }
    }
}

/// Private tracker identification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct TrackersConfig {
    /// Substrings that identify a private tracker in announce or scrape URLs.
    #[serde(default)]
    pub private: Vec<String>,
}

impl TrackersConfig {
    fn merge(&mut self, other: TrackersConfig) {
        self.private.extend(other.private);
    }
}

/// Marker files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct MarkersConfig {
    /// When this file exists the system is forced offline.
    pub force_stop: PathBuf,
    /// When this file exists (and force-stop does not) the system is forced online.
    pub force_start: PathBuf,
    /// Lock file held for the duration of a pass.
    pub run_lock: PathBuf,
}

impl Default for MarkersConfig {
    fn default() -> Self {
        Self {
            force_stop: PathBuf::from("/var/lib/seedbox-warden/force-stop"),
            force_start: PathBuf::from("/var/lib/seedbox-warden/force-start"),
            run_lock: PathBuf::from("/run/seedbox-warden.lock"),
        }
    }
}

impl MarkersConfig {
    fn merge(&mut self, other: MarkersConfig) {
        let default = MarkersConfig::default();
        if other.force_stop != default.force_stop {
            self.force_stop = other.force_stop;
        }
        if other.force_start != default.force_start {
            self.force_start = other.force_start;
        }
        if other.run_lock != default.run_lock {
            self.run_lock = other.run_lock;
        }
    }
}

/// Placeholder shown instead of secrets.
pub const REDACTED: &str = "<redacted>";

/// Transmission daemon settings.
#[derive(Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Host the RPC interface answers on once the daemon is ready.
    pub rpc_host: String,
    /// RPC port.
    pub rpc_port: u16,
    /// RPC endpoint path.
    pub rpc_path: String,
    /// RPC username (basic auth).
    pub username: Option<String>,
    /// RPC password (basic auth).
    pub password: Option<String>,
    /// Timeout for a single RPC request in seconds.
    pub rpc_timeout_secs: u64,
    /// Daemon executable used for relaunching.
    pub binary: PathBuf,
    /// Substring of the daemon's executable path used for liveness checks.
    pub process_name: String,
    /// PID file passed with `-x` when relaunching.
    pub pid_file: Option<PathBuf>,
    /// Additional arguments appended when relaunching.
    pub extra_args: Vec<String>,
}

impl fmt::Debug for DaemonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DaemonConfig")
            .field("rpc_host", &self.rpc_host)
            .field("rpc_port", &self.rpc_port)
            .field("rpc_path", &self.rpc_path)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| REDACTED))
            .field("rpc_timeout_secs", &self.rpc_timeout_secs)
            .field("binary", &self.binary)
            .field("process_name", &self.process_name)
            .field("pid_file", &self.pid_file)
            .field("extra_args", &self.extra_args)
            .finish()
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 9091,
            rpc_path: "/transmission/rpc".to_string(),
            username: None,
            password: None,
            rpc_timeout_secs: 10,
            binary: PathBuf::from("/usr/bin/transmission-daemon"),
            process_name: "transmission-daemon".to_string(),
            pid_file: None,
            extra_args: Vec::new(),
        }
    }
}

impl DaemonConfig {
    fn merge(&mut self, other: DaemonConfig) {
        let default = DaemonConfig::default();
        if other.rpc_host != default.rpc_host {
            self.rpc_host = other.rpc_host;
        }
        if other.rpc_port != default.rpc_port {
            self.rpc_port = other.rpc_port;
        }
        if other.rpc_path != default.rpc_path {
            self.rpc_path = other.rpc_path;
        }
        if other.username.is_some() {
            self.username = other.username;
        }
        if other.password.is_some() {
            self.password = other.password;
        }
        if other.rpc_timeout_secs != default.rpc_timeout_secs {
            self.rpc_timeout_secs = other.rpc_timeout_secs;
        }
        if other.binary != default.binary {
            self.binary = other.binary;
        }
        if other.process_name != default.process_name {
            self.process_name = other.process_name;
        }
        if other.pid_file.is_some() {
            self.pid_file = other.pid_file;
        }
        self.extra_args.extend(other.extra_args);
    }

    /// Full URL of the RPC endpoint.
    pub fn rpc_url(&self) -> String {
        format!("http://{}:{}{}", self.rpc_host, self.rpc_port, self.rpc_path)
    }

    /// Timeout for a single RPC request.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc_timeout_secs)
    }

    /// Arguments that relaunch the daemon bound to `address`.
    pub fn launch_args(&self, address: Ipv4Addr) -> Vec<String> {
        let mut args = vec!["--bind-address-ipv4".to_string(), address.to_string()];
        if let Some(ref pid_file) = self.pid_file {
            args.push("-x".to_string());
            args.push(pid_file.display().to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args
    }
}

/// VPN client settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct VpnConfig {
    /// Command (program followed by arguments) that brings the tunnel up.
    pub start_command: Vec<String>,
    /// Command (program followed by arguments) that brings the tunnel down.
    pub stop_command: Vec<String>,
    /// Substring of the VPN client's executable path.
    pub process_name: String,
    /// Outbound address of the host when the tunnel is down.
    pub baseline_address: Option<Ipv4Addr>,
    /// `host:port` that must accept a connection for an up tunnel to count as healthy.
    pub probe_target: String,
    /// Address the daemon is bound to while offline instead of the baseline.
    pub offline_bind_address: Option<Ipv4Addr>,
}

impl Default for VpnConfig {
    fn default() -> Self {
        Self {
            start_command: Vec::new(),
            stop_command: Vec::new(),
            process_name: "openvpn".to_string(),
            baseline_address: None,
            probe_target: "8.8.8.8:53".to_string(),
            offline_bind_address: None,
        }
    }
}

impl VpnConfig {
    fn merge(&mut self, other: VpnConfig) {
        let default = VpnConfig::default();
        if !other.start_command.is_empty() {
            self.start_command = other.start_command;
        }
        if !other.stop_command.is_empty() {
            self.stop_command = other.stop_command;
        }
        if other.process_name != default.process_name {
            self.process_name = other.process_name;
        }
        if other.baseline_address.is_some() {
            self.baseline_address = other.baseline_address;
        }
        if other.probe_target != default.probe_target {
            self.probe_target = other.probe_target;
        }
        if other.offline_bind_address.is_some() {
            self.offline_bind_address = other.offline_bind_address;
        }
    }

    /// The baseline address (unspecified when not configured).
    pub fn baseline(&self) -> Ipv4Addr {
        self.baseline_address.unwrap_or(Ipv4Addr::UNSPECIFIED)
    }

    /// Probe target split into host and port.
    pub fn probe(&self) -> Option<(&str, u16)> {
        split_target(&self.probe_target)
    }
}

/// How the post-stop liveness check interprets what it sees.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopCheck {
    /// Succeed as soon as the process is seen still running.
    #[default]
    StillRunning,
    /// Succeed as soon as the process is seen gone.
    Exited,
}

/// Polling behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between two checks of any wait loop.
    pub interval_secs: u64,
    /// Bound for waits that otherwise poll until the external system converges.
    pub max_checks: Option<u32>,
    /// Number of checks after a stop command.
    pub stop_checks: u32,
    /// Interpretation of the post-stop checks.
    pub stop_check: StopCheck,
    /// TCP connect timeout for port probes in milliseconds.
    pub port_timeout_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 10,
            max_checks: None,
            stop_checks: 10,
            stop_check: StopCheck::default(),
            port_timeout_ms: 1000,
        }
    }
}

impl PollingConfig {
    fn merge(&mut self, other: PollingConfig) {
        let default = PollingConfig::default();
        if other.interval_secs != default.interval_secs {
            self.interval_secs = other.interval_secs;
        }
        if other.max_checks.is_some() {
            self.max_checks = other.max_checks;
        }
        if other.stop_checks != default.stop_checks {
            self.stop_checks = other.stop_checks;
        }
        if other.stop_check != default.stop_check {
            self.stop_check = other.stop_check;
        }
        if other.port_timeout_ms != default.port_timeout_ms {
            self.port_timeout_ms = other.port_timeout_ms;
        }
    }

    /// Delay between two checks.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Policy for waits that converge eventually.
    pub fn wait_policy(&self) -> PollPolicy {
        match self.max_checks {
            Some(max) => PollPolicy::bounded(self.interval(), max),
            None => PollPolicy::unbounded(self.interval()),
        }
    }

    /// Policy for the fixed number of checks after a stop command.
    pub fn stop_policy(&self) -> PollPolicy {
        PollPolicy::bounded(self.interval(), self.stop_checks)
    }

    /// TCP connect timeout for port probes.
    pub fn port_timeout(&self) -> Duration {
        Duration::from_millis(self.port_timeout_ms)
    }
}

/// Split `host:port`, accepting bracketed IPv6 hosts.
fn split_target(target: &str) -> Option<(&str, u16)> {
    let (host, port) = target.rsplit_once(':')?;
    let host = host.trim_start_matches('[').trim_end_matches(']');
    if host.is_empty() {
        return None;
    }
    Some((host, port.parse().ok()?))
}
