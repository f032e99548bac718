//! Configuration loading with hierarchy merging.
//!
//! Configuration is loaded from multiple sources and merged in order:
//!
//! 1. System config: `/etc/seedbox-warden/config.toml`
//! 2. User config: `~/.config/seedbox-warden/config.toml`
//! 3. Additional config file (via `--config` flag)
//!
//! Lists (required paths, private trackers) are **merged** (appended).
//! Scalars are **overridden**. The merged result is validated before it is
//! handed to the supervisor.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::error::ConfigError;
use super::schema::Config;

/// System-wide configuration path.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/seedbox-warden/config.toml";

/// User configuration directory name.
pub const USER_CONFIG_DIR: &str = "seedbox-warden";

/// User configuration filename.
pub const USER_CONFIG_FILE: &str = "config.toml";

/// Configuration loader with support for hierarchy merging.
pub struct ConfigLoader {
    /// Path to system-wide configuration.
    system_path: PathBuf,
    /// Path to user configuration.
    user_path: PathBuf,
}

impl ConfigLoader {
    /// Create a new ConfigLoader with default paths.
    #[must_use]
    pub fn new() -> Self {
        let user_config_dir = dirs::config_dir()
            .map(|p| p.join(USER_CONFIG_DIR))
            .unwrap_or_else(|| PathBuf::from(".config").join(USER_CONFIG_DIR));

        Self {
            system_path: PathBuf::from(SYSTEM_CONFIG_PATH),
            user_path: user_config_dir.join(USER_CONFIG_FILE),
        }
    }

    /// Create a ConfigLoader with custom paths (for testing).
    #[must_use]
    pub fn with_paths(system_path: PathBuf, user_path: PathBuf) -> Self {
        Self {
            system_path,
            user_path,
        }
    }

    /// Load, merge and validate configuration from all sources.
    ///
    /// Missing system and user files are skipped. A file passed explicitly must
    /// exist. At least one file has to be found, since the VPN commands and the
    /// baseline address have no defaults.
    pub fn load(&self, extra: Option<&Path>) -> Result<Config, ConfigError> {
        let config = self.load_unvalidated(extra)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and merge configuration without validating it.
    pub fn load_unvalidated(&self, extra: Option<&Path>) -> Result<Config, ConfigError> {
        let mut config = Config::default();
        let mut found_any = false;

        for path in [&self.system_path, &self.user_path] {
            match self.load_file(path)? {
                Some(file_config) => {
                    config.merge(file_config);
                    found_any = true;
                    debug!("Loaded config from {:?}", path);
                }
                None => debug!("No config found at {:?}", path),
            }
        }

        if let Some(extra_path) = extra {
            match self.load_file(extra_path)? {
                Some(file_config) => {
                    config.merge(file_config);
                    found_any = true;
                    debug!("Loaded additional config from {:?}", extra_path);
                }
                None => {
                    // Unlike system/user config, a missing CLI-specified config is an error
                    return Err(ConfigError::ReadError {
                        path: extra_path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "Specified config file not found",
                        ),
                    });
                }
            }
        }

        if !found_any {
            return Err(ConfigError::NoConfigFound {
                searched: vec![self.system_path.clone(), self.user_path.clone()],
            });
        }

        Ok(config)
    }

    /// Load a config file, returning None if it doesn't exist.
    fn load_file(&self, path: &Path) -> Result<Option<Config>, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                let config: Config =
                    toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                        path: path.to_path_buf(),
                        source: e,
                    })?;
                Ok(Some(config))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ConfigError::ReadError {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;
    use tempfile::tempdir;

    const COMPLETE: &str = r#"
        [vpn]
        start_command = ["/bin/true"]
        stop_command = ["/bin/true"]
        baseline_address = "192.168.1.10"
    "#;

    #[test]
    fn test_no_files_is_an_error() {
        let dir = tempdir().unwrap();
        let loader = ConfigLoader::with_paths(
            dir.path().join("nonexistent_system.toml"),
            dir.path().join("nonexistent_user.toml"),
        );

        let err = loader.load(None).unwrap_err();
        assert!(matches!(err, ConfigError::NoConfigFound { ref searched } if searched.len() == 2));
    }

    #[test]
    fn test_system_config_alone() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), COMPLETE).unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );
        let config = loader.load(None).unwrap();

        assert_eq!(config.vpn.baseline_address, Some(Ipv4Addr::new(192, 168, 1, 10)));
    }

    #[test]
    fn test_user_config_overrides_system() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), COMPLETE).unwrap();
        fs::write(
            dir.path().join("user.toml"),
            r#"
                [vpn]
                baseline_address = "10.0.0.5"

                [trackers]
                private = ["user-tracker"]
            "#,
        )
        .unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );
        let config = loader.load(None).unwrap();

        assert_eq!(config.vpn.baseline_address, Some(Ipv4Addr::new(10, 0, 0, 5)));
        // Commands from the system file survive
        assert_eq!(config.vpn.start_command, vec!["/bin/true"]);
        assert_eq!(config.trackers.private, vec!["user-tracker"]);
    }

    #[test]
    fn test_extra_config_has_highest_priority() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), COMPLETE).unwrap();
        let extra = dir.path().join("extra.toml");
        fs::write(&extra, "[daemon]\nrpc_port = 9999\n").unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );
        let config = loader.load(Some(&extra)).unwrap();

        assert_eq!(config.daemon.rpc_port, 9999);
    }

    #[test]
    fn test_missing_extra_config_is_an_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), COMPLETE).unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );
        let result = loader.load(Some(&dir.path().join("missing.toml")));

        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn test_invalid_toml_returns_error() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("invalid.toml"), "this is not valid TOML [[[").unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("invalid.toml"),
            dir.path().join("user.toml"),
        );
        let result = loader.load(None);

        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }

    #[test]
    fn test_incomplete_config_fails_validation() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("system.toml"), "[daemon]\nrpc_port = 9091\n").unwrap();

        let loader = ConfigLoader::with_paths(
            dir.path().join("system.toml"),
            dir.path().join("user.toml"),
        );

        assert!(matches!(loader.load(None), Err(ConfigError::InvalidValue { .. })));
        // The unvalidated view is still available for inspection
        assert!(loader.load_unvalidated(None).is_ok());
    }
}
