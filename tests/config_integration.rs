use std::fs;
use std::net::Ipv4Addr;
use std::path::Path;

use seedbox_warden::config::{ConfigError, ConfigLoader, StopCheck};
use tempfile::TempDir;

const SYSTEM: &str = r#"
[vpn]
start_command = ["/usr/bin/systemctl", "start", "openvpn-client@seedbox"]
stop_command = ["/usr/bin/systemctl", "stop", "openvpn-client@seedbox"]
baseline_address = "192.168.1.10"

[trackers]
private = ["tracker.example.org"]

[storage]
required_paths = ["/mnt/media"]
"#;

const USER: &str = r#"
[trackers]
private = ["announce.example.net"]

[polling]
interval_secs = 5
stop_check = "exited"
"#;

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn test_system_and_user_merge() {
    let dir = TempDir::new().unwrap();
    let system = write(dir.path(), "system.toml", SYSTEM);
    let user = write(dir.path(), "user.toml", USER);

    let config = ConfigLoader::with_paths(system, user).load(None).unwrap();

    assert_eq!(config.vpn.baseline_address, Some(Ipv4Addr::new(192, 168, 1, 10)));
    assert_eq!(config.trackers.private, vec!["tracker.example.org", "announce.example.net"]);
    assert_eq!(config.polling.interval_secs, 5);
    assert_eq!(config.polling.stop_check, StopCheck::Exited);
    // Untouched defaults survive
    assert_eq!(config.daemon.rpc_port, 9091);
}

#[test]
fn test_extra_file_overrides() {
    let dir = TempDir::new().unwrap();
    let system = write(dir.path(), "system.toml", SYSTEM);
    let extra = write(
        dir.path(),
        "extra.toml",
        "[daemon]\nrpc_port = 9191\n\n[vpn]\noffline_bind_address = \"127.0.0.1\"\n",
    );

    let config = ConfigLoader::with_paths(system, dir.path().join("absent.toml"))
        .load(Some(extra.as_path()))
        .unwrap();

    assert_eq!(config.daemon.rpc_port, 9191);
    assert_eq!(config.vpn.offline_bind_address, Some(Ipv4Addr::LOCALHOST));
}

#[test]
fn test_no_config_found() {
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_paths(dir.path().join("a.toml"), dir.path().join("b.toml"));

    assert!(matches!(loader.load(None), Err(ConfigError::NoConfigFound { .. })));
}

#[test]
fn test_missing_vpn_commands_rejected() {
    let dir = TempDir::new().unwrap();
    let user = write(dir.path(), "user.toml", USER);
    let loader = ConfigLoader::with_paths(dir.path().join("absent.toml"), user);

    assert!(matches!(loader.load(None), Err(ConfigError::InvalidValue { .. })));
    assert!(loader.load_unvalidated(None).is_ok());
}

#[test]
fn test_shipped_example_config_is_valid() {
    let example = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/default.toml");
    let dir = TempDir::new().unwrap();
    let loader = ConfigLoader::with_paths(example, dir.path().join("absent.toml"));

    let config = loader.load(None).unwrap();

    assert_eq!(config.daemon.process_name, "transmission-daemon");
    assert_eq!(config.schedule.weekday.start.to_string(), "01:00");
}
