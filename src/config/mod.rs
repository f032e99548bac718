//! Configuration system for seedbox-warden.
//!
//! This module provides TOML configuration loading with hierarchy merging.
//!
//! # Configuration Hierarchy
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. System config: `/etc/seedbox-warden/config.toml`
//! 2. User config: `~/.config/seedbox-warden/config.toml`
//! 3. Additional config file (via `--config` flag)
//!
//! At least one configuration file must exist.
//!
//! # Merge Behavior
//!
//! - **Lists** (required paths, private trackers, extra daemon args) are **merged**
//! - **Scalars** (ports, paths, commands, polling) are **overridden**
//!
//! # Example
//!
//! ```toml
//! [vpn]
//! start_command = ["/usr/bin/systemctl", "start", "openvpn-client@seedbox"]
//! stop_command = ["/usr/bin/systemctl", "stop", "openvpn-client@seedbox"]
//! baseline_address = "192.168.1.10"
//!
//! [schedule.weekday]
//! start = "01:00"
//! stop = "07:30"
//! ```

mod error;
mod loader;
mod schema;

pub use error::ConfigError;
pub use loader::{ConfigLoader, SYSTEM_CONFIG_PATH};
pub use schema::{
    ClockTime, Config, DaemonConfig, MarkersConfig, PollingConfig, REDACTED, ScheduleConfig, StopCheck,
    StorageConfig, TrackersConfig, VpnConfig, WindowConfig,
};
