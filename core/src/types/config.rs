use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// How fleetctl commands reach the cluster.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunnerKind {
    /// Run a local `fleetctl --tunnel <host>`; unit files are passed as
    /// local paths.
    Shell,
    /// Run `fleetctl` on the host over SSH; unit files are staged remotely.
    #[default]
    Ssh,
}

impl RunnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunnerKind::Shell => "shell",
            RunnerKind::Ssh => "ssh",
        }
    }
}

impl FromStr for RunnerKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shell" => Ok(RunnerKind::Shell),
            "ssh" => Ok(RunnerKind::Ssh),
            other => Err(ConfigError::UnknownRunner(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SshSettings {
    pub user: String,
    pub port: u16,
    pub identity_file: Option<String>,
    /// Seconds handed to ssh's `ConnectTimeout`.
    pub connect_timeout: u32,
}

impl Default for SshSettings {
    fn default() -> Self {
        SshSettings {
            user: "core".into(),
            port: 22,
            identity_file: None,
            connect_timeout: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LogSettings {
    /// An `EnvFilter` directive, e.g. `info` or `fleet_core=debug`.
    pub level: String,
    /// Append log lines to this file instead of stderr.
    pub file: Option<PathBuf>,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            level: "info".into(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    /// Host tried first on every discovery.
    pub fleet_host: Option<String>,
    /// etcd discovery registry consulted when no known host answers.
    pub discovery_url: Option<String>,
    pub runner: RunnerKind,
    /// Name or path of the fleetctl binary.
    pub fleetctl: String,
    pub ssh: SshSettings,
    pub log: LogSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            fleet_host: None,
            discovery_url: None,
            runner: RunnerKind::default(),
            fleetctl: "fleetctl".into(),
            ssh: SshSettings::default(),
            log: LogSettings::default(),
        }
    }
}
