// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration: a TOML file plus one environment-variable
//! override for the root directory, mirroring `oj-daemon`'s XDG-aware
//! `Config::load()` — adapted from "one fixed per-user state dir" to "one
//! operator-supplied root directory", since this control plane runs at the
//! host level rather than per user (§2.3).

use fsman_core::{DaemonMode, FsDriver, RecoveryPolicy};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("root_dir must not be empty")]
    EmptyRoot,

    #[error("daemon_binary must not be empty")]
    EmptyDaemonBinary,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_control_socket_timeout_secs() -> u64 {
    30
}

fn default_allowed_fs_drivers() -> Vec<FsDriver> {
    vec![FsDriver::Fusedev, FsDriver::Fscache, FsDriver::Blockdev]
}

fn default_recovery_policy() -> RecoveryPolicy {
    RecoveryPolicy::Restart
}

/// Process-wide configuration, loaded once at startup (§2.3).
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Root directory under which sockets, config, logs, and the registry
    /// database live: `<root>/{sockets,config,logs,registry.db,supervisor}`.
    pub root_dir: PathBuf,

    /// Path to the FS daemon executable (`nydusd`-equivalent) this process
    /// forks for every `start_daemon` call.
    pub daemon_binary: PathBuf,

    #[serde(default = "default_recovery_policy")]
    pub default_recovery_policy: RecoveryPolicy,

    #[serde(default = "default_allowed_fs_drivers")]
    pub allowed_fs_drivers: Vec<FsDriver>,

    #[serde(default = "default_control_socket_timeout_secs")]
    pub control_socket_timeout_secs: u64,

    /// Default daemon mode for new daemons when the caller doesn't specify
    /// one (dedicated vs. shared).
    #[serde(default)]
    pub default_daemon_mode: DaemonModeConfig,

    /// Directory for rotating log files. Logs to stderr if unset.
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DaemonModeConfig {
    #[default]
    Dedicated,
    Shared,
}

impl From<DaemonModeConfig> for DaemonMode {
    fn from(mode: DaemonModeConfig) -> Self {
        match mode {
            DaemonModeConfig::Dedicated => DaemonMode::Dedicated,
            DaemonModeConfig::Shared => DaemonMode::Shared,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl RegistryConfig {
    /// Loads from `path`, then applies the `FSMAN_ROOT_DIR` environment
    /// override (takes precedence over the file's `root_dir`) and validates.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;
        let mut config: RegistryConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

        if let Ok(root) = std::env::var("FSMAN_ROOT_DIR") {
            config.root_dir = PathBuf::from(root);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.root_dir.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }
        if self.daemon_binary.as_os_str().is_empty() {
            return Err(ConfigError::EmptyDaemonBinary);
        }
        Ok(())
    }

    pub fn sockets_dir(&self) -> PathBuf {
        self.root_dir.join("sockets")
    }

    pub fn config_dir(&self) -> PathBuf {
        self.root_dir.join("config")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.root_dir.join("logs")
    }

    pub fn registry_path(&self) -> PathBuf {
        self.root_dir.join("registry.db")
    }

    pub fn supervisor_dir(&self) -> PathBuf {
        self.root_dir.join("supervisor")
    }
}
