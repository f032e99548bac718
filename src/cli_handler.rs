//! Subcommand handling for seedbox-warden.

use anyhow::{Context, Result};
use tracing::{debug, warn};

use crate::cli::{Cli, Commands};
use crate::clock::SystemClock;
use crate::config::{Config, ConfigLoader};
use crate::exec::SystemExecutor;
use crate::probe::{NetworkProbe, ProcFs, ProcessProbe, SystemNetwork};
use crate::rpc::TransmissionClient;
use crate::supervisor::{Host, Supervisor};
use crate::telemetry::AuditLogger;

/// Dispatch the parsed command line.
pub fn handle_command(cli: &Cli) -> Result<()> {
    let config = ConfigLoader::new()
        .load(cli.config.as_deref())
        .context("Failed to load configuration")?;
    debug!("Loaded configuration: {:?}", config);

    match cli.command_or_default() {
        Commands::Run => run_pass(&config),
        Commands::Decide => decide(&config),
        Commands::Probe => probe(&config),
        Commands::CheckConfig => print_config(&config),
    }
}

/// Connect the audit trail, falling back to a null logger without syslog.
fn audit_logger() -> AuditLogger {
    match AuditLogger::new() {
        Ok(logger) => logger,
        Err(e) => {
            warn!("Audit logging disabled: {}", e);
            AuditLogger::new_null()
        }
    }
}

fn run_pass(config: &Config) -> Result<()> {
    let audit = audit_logger();
    let client = TransmissionClient::new(&config.daemon).context("Failed to create RPC client")?;
    let network = SystemNetwork::new(config.polling.port_timeout());
    let processes = ProcFs::new();
    let host = Host {
        clock: &SystemClock,
        processes: &processes,
        network: &network,
        executor: &SystemExecutor,
        client: &client,
    };

    let report = Supervisor::new(config, host, &audit)
        .run_pass()
        .context("Failed to take the run lock")?;
    println!("{}", report);
    Ok(())
}

fn decide(config: &Config) -> Result<()> {
    let audit = AuditLogger::new_null();
    let client = TransmissionClient::new(&config.daemon).context("Failed to create RPC client")?;
    let network = SystemNetwork::new(config.polling.port_timeout());
    let processes = ProcFs::new();
    let host = Host {
        clock: &SystemClock,
        processes: &processes,
        network: &network,
        executor: &SystemExecutor,
        client: &client,
    };

    let decision = Supervisor::new(config, host, &audit).preview();
    println!("{}", decision);
    println!("tunnel wanted: {}", decision.state.wants_online());
    Ok(())
}

fn probe(config: &Config) -> Result<()> {
    let network = SystemNetwork::new(config.polling.port_timeout());
    let processes = ProcFs::new();
    let baseline = config.vpn.baseline();
    let outbound = network.outbound_address();

    println!("outbound address:  {}", outbound);
    println!("baseline address:  {}", baseline);
    println!("tunnel:            {}", if outbound != baseline { "up" } else { "down" });
    println!("vpn process:       {}", pid_line(&processes, &config.vpn.process_name));
    println!("daemon process:    {}", pid_line(&processes, &config.daemon.process_name));

    let port = config.daemon.rpc_port;
    let rpc_open = network.is_port_open(&config.daemon.rpc_host, port);
    println!(
        "daemon rpc:        {}:{} {}",
        config.daemon.rpc_host,
        port,
        if rpc_open { "open" } else { "closed" }
    );
    let bound = network.is_port_open(&outbound.to_string(), port);
    println!(
        "daemon on {}: {}",
        outbound,
        if bound { "listening" } else { "not listening" }
    );
    if let Some((host, probe_port)) = config.vpn.probe() {
        println!(
            "probe target:      {} {}",
            config.vpn.probe_target,
            if network.can_reach(host, probe_port) { "reachable" } else { "unreachable" }
        );
    }
    Ok(())
}

fn pid_line(processes: &dyn ProcessProbe, name: &str) -> String {
    match processes.find(name) {
        Some(pid) => format!("{} (pid {})", name, pid),
        None => format!("{} not running", name),
    }
}

fn print_config(config: &Config) -> Result<()> {
    let rendered = toml::to_string_pretty(&config.redacted()).context("Failed to render configuration")?;
    print!("{}", rendered);
    Ok(())
}
