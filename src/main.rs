//! seedbox-warden: keep a torrent daemon bound to the right VPN identity.
//!
//! This is the main entry point for the seedbox-warden binary. It parses the
//! command line, sets up diagnostics and hands over to the command handler.
//!
//! # Output
//!
//! - **Audit logging**: goes to syslog, one JSON event per decision or action
//! - **Diagnostics**: `tracing` output on stderr, controlled by `-v` and `RUST_LOG`
//! - **Results**: the pass report or the requested listing on stdout

use anyhow::{Context, Result};
use clap::Parser;
use seedbox_warden::{cli::Cli, cli_handler};
use tracing::debug;

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose)?;

    debug!("Parsed CLI arguments: {:?}", cli);

    cli_handler::handle_command(&cli)
}

/// Initialize the tracing subscriber for diagnostics.
///
/// This is separate from the audit telemetry which goes to syslog.
///
/// # Verbosity Levels
/// - 0 (default): `RUST_LOG`, or info
/// - 1 (-v): Info level
/// - 2 (-vv): Debug level
/// - 3+ (-vvv): Trace level
fn init_tracing(verbose: u8) -> Result<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    Ok(())
}
