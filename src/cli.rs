//! Command-line interface definitions for seedbox-warden.
//!
//! Uses clap's derive API for type-safe argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Keep a torrent daemon bound to the right VPN identity.
///
/// Each invocation runs one supervisor pass: decide whether the tunnel should be
/// up (override markers, schedule, transfer activity), drive the VPN client
/// there and rebind the daemon to the resulting address. Run it periodically
/// from cron or a systemd timer.
#[derive(Parser, Debug)]
#[command(name = "seedbox-warden")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run (defaults to `run`).
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Path to additional config file.
    ///
    /// This config file is merged on top of system and user configs,
    /// giving it the highest priority.
    #[arg(short = 'c', long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity.
    ///
    /// Can be specified multiple times:
    /// -v    = info level
    /// -vv   = debug level
    /// -vvv  = trace level
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Subcommands for seedbox-warden.
#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Commands {
    /// Run one supervisor pass.
    Run,

    /// Print the state decision without acting on it.
    ///
    /// Transfers that would be force-started are only reported.
    Decide,

    /// Print what the supervisor currently observes.
    Probe,

    /// Load and validate the configuration, then print it merged.
    CheckConfig,
}

impl Cli {
    /// The subcommand to execute.
    pub fn command_or_default(&self) -> Commands {
        self.command.unwrap_or(Commands::Run)
    }
}
