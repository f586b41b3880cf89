use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::error::TransportError;
use crate::infrastructure::runner::{CommandRunner, SshOptions};

/// Key of the `Cluster` a machine was discovered through. Association only:
/// it never keeps a cluster alive and is ignored by equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClusterId(u64);

impl ClusterId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ClusterId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A fleet machine as reported by `fleetctl list-machines -l`.
///
/// Two machines are equal when `id` and `ip` match. `metadata` is not part
/// of equality, so equal machines may carry different metadata.
#[derive(Debug, Clone)]
pub struct Machine {
    pub id: String,
    pub ip: String,
    pub metadata: Option<String>,
    pub cluster: Option<ClusterId>,
}

impl Machine {
    pub fn new(id: impl Into<String>, ip: impl Into<String>) -> Self {
        Machine {
            id: id.into(),
            ip: ip.into(),
            metadata: None,
            cluster: None,
        }
    }

    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = Some(metadata.into());
        self
    }

    pub fn in_cluster(mut self, cluster: ClusterId) -> Self {
        self.cluster = Some(cluster);
        self
    }

    /// Run `command` on this machine over ssh and return its stdout.
    ///
    /// `runner` should be an ssh-capable runner; the machine's `ip` is the
    /// target and `port` overrides the configured ssh port.
    pub fn ssh(&self, runner: &dyn CommandRunner, command: &[&str], port: u16) -> Result<String, TransportError> {
        let tokens: Vec<String> = command.iter().map(|t| t.to_string()).collect();
        let output = runner.run(&tokens, &self.ip, Some(&SshOptions::port(port)))?;
        Ok(output.stdout)
    }

    pub fn view(&self) -> MachineView<'_> {
        MachineView {
            id: &self.id,
            ip: &self.ip,
            metadata: self.metadata.as_deref(),
        }
    }
}

impl PartialEq for Machine {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.ip == other.ip
    }
}

impl Eq for Machine {}

/// Serializable projection of a `Machine`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct MachineView<'a> {
    pub id: &'a str,
    pub ip: &'a str,
    pub metadata: Option<&'a str>,
}
