//! Discovery directory: the last resort when no known host answers.
//!
//! `EtcdDiscovery` reads an etcd discovery registry (the URL handed to
//! CoreOS machines at boot) and returns the host of every registered peer.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, warn};

pub trait Discovery {
    /// Candidate hosts, empty when the directory is unavailable.
    fn hosts(&self) -> Vec<String>;
}

/// No directory configured.
pub struct NoDiscovery;

impl Discovery for NoDiscovery {
    fn hosts(&self) -> Vec<String> {
        Vec::new()
    }
}

/// A fixed host list.
#[derive(Debug, Clone, Default)]
pub struct StaticDiscovery {
    hosts: Vec<String>,
}

impl StaticDiscovery {
    pub fn new(hosts: Vec<String>) -> Self {
        StaticDiscovery { hosts }
    }
}

impl Discovery for StaticDiscovery {
    fn hosts(&self) -> Vec<String> {
        self.hosts.clone()
    }
}


// ---------------------------------------------------------------------------
// EtcdDiscovery
// ---------------------------------------------------------------------------

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct EtcdDiscovery {
    url: String,
}

impl EtcdDiscovery {
    pub fn new(url: impl Into<String>) -> Self {
        EtcdDiscovery { url: url.into() }
    }

    fn fetch(&self) -> Result<String, reqwest::Error> {
        reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?
            .get(&self.url)
            .send()?
            .error_for_status()?
            .text()
    }
}

impl Discovery for EtcdDiscovery {
    fn hosts(&self) -> Vec<String> {
        let body = match self.fetch() {
            Ok(body) => body,
            Err(e) => {
                warn!(url = %self.url, error = %e, "discovery request failed");
                return Vec::new();
            }
        };
        match hosts_from_registry(&body) {
            Ok(hosts) => {
                debug!(url = %self.url, ?hosts, "discovered hosts");
                hosts
            }
            Err(e) => {
                warn!(url = %self.url, error = %e, "unreadable discovery registry");
                Vec::new()
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct Registry {
    node: RegistryNode,
}

#[derive(Debug, Deserialize)]
struct RegistryNode {
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    nodes: Vec<RegistryNode>,
}

/// Hosts of the peers listed in an etcd discovery registry response.
///
/// Peer values are either a bare URL (`http://10.0.0.1:7001`) or
/// `name=url` pairs (`e1=http://10.0.0.1:2380,e1=http://...`). Entries that
/// do not parse are skipped; duplicates are dropped.
pub fn hosts_from_registry(body: &str) -> Result<Vec<String>, serde_json::Error> {
    let registry: Registry = serde_json::from_str(body)?;
    let mut hosts: Vec<String> = Vec::new();
    let values = registry.node.nodes.iter().filter_map(|n| n.value.as_deref());
    for value in values {
        for peer in value.split(',') {
            let peer_url = peer.split_once('=').map(|(_, u)| u).unwrap_or(peer).trim();
            let host = url::Url::parse(peer_url)
                .ok()
                .and_then(|u| u.host_str().map(str::to_string));
            if let Some(host) = host {
                if !hosts.contains(&host) {
                    hosts.push(host);
                }
            }
        }
    }
    Ok(hosts)
}
