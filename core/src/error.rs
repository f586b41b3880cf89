//! Error types for the fleet core.
//!
//! A command that runs but exits non-zero is *not* an error anywhere in this
//! crate; it surfaces as `Ok(false)`. The variants below cover the cases
//! where no exit status could be obtained at all (transport), the output
//! could not be understood (parse), or local setup went wrong.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, FleetError>;


// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// The remote command could not be executed at all (unreachable host,
/// authentication failure, missing binary).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("transport failure on {host}: {message}")]
pub struct TransportError {
    pub host: String,
    pub message: String,
}

impl TransportError {
    pub fn new(host: impl Into<String>, message: impl Into<String>) -> Self {
        TransportError {
            host: host.into(),
            message: message.into(),
        }
    }
}


// ---------------------------------------------------------------------------
// Parse
// ---------------------------------------------------------------------------

/// The tabular output of a fleetctl query could not be mapped to rows or
/// entities.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("row {line} has {found} cells but the header only names {expected}")]
    TooManyCells {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("row {line} is missing the '{field}' column")]
    MissingField { line: usize, field: String },
    #[error("malformed machine reference '{0}', expected '<id>/<ip>'")]
    MachineRef(String),
}


// ---------------------------------------------------------------------------
// Staging
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StagingError {
    #[error("unit file {0} has no file name")]
    NoFileName(PathBuf),
    #[error("copying {path} to {host} failed: {reason}")]
    Copy {
        path: PathBuf,
        host: String,
        reason: String,
    },
    #[error("preparing remote directory on {host} failed: {reason}")]
    RemoteDir { host: String, reason: String },
}


// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("unknown runner '{0}', expected 'shell' or 'ssh'")]
    UnknownRunner(String),
}


// ---------------------------------------------------------------------------
// FleetError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FleetError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("staging error: {0}")]
    Staging(#[from] StagingError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("no fleet host is known; configure fleet_host or a discovery url")]
    NoFleetHost,
}

/// Render an error and its `source()` chain, one cause per line.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut current = err.source();
    while let Some(cause) = current {
        out.push_str("\n  caused by: ");
        out.push_str(&cause.to_string());
        current = cause.source();
    }
    out
}
