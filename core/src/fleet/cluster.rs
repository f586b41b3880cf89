//! The cluster model and its discovery procedure.
//!
//! A `Cluster` owns the canonical set of machines. `discover` throws the set
//! away and rebuilds it from the first host that answers `list-machines`:
//! the configured default host and the machines known before the rebuild
//! first, then whatever the discovery directory lists. If nobody answers
//! the cluster stays empty.

use std::rc::Rc;

use rand::seq::SliceRandom;
use tracing::{debug, error, info, warn};

use super::context::FleetContext;
use crate::error::error_chain;
use crate::fleetctl::fetcher::Fetcher;
use crate::identity_set::IdentitySet;
use crate::types::machine::{ClusterId, Machine};

pub struct Cluster {
    id: ClusterId,
    machines: IdentitySet<Machine>,
    ctx: Rc<FleetContext>,
}

impl Cluster {
    pub fn new(ctx: Rc<FleetContext>) -> Self {
        Cluster {
            id: ClusterId::next(),
            machines: IdentitySet::new(),
            ctx,
        }
    }

    pub fn id(&self) -> ClusterId {
        self.id
    }

    /// IPs of the known machines, in set order.
    pub fn fleet_hosts(&self) -> Vec<String> {
        self.machines.iter().map(|m| m.ip.clone()).collect()
    }

    /// A uniformly random known host.
    pub fn fleet_host(&self) -> Option<String> {
        self.fleet_hosts().choose(&mut rand::thread_rng()).cloned()
    }

    /// All machines, rediscovering first when none are known.
    pub fn machines(&mut self) -> Vec<Rc<Machine>> {
        if self.machines.is_empty() {
            self.discover();
        }
        self.machines.to_vec()
    }

    /// The machines known right now; never triggers a rebuild.
    pub fn machine_set(&self) -> &IdentitySet<Machine> {
        &self.machines
    }

    pub fn is_empty(&self) -> bool {
        self.machines.is_empty()
    }

    /// The canonical instance for `machine`, adding it if new.
    pub fn add_or_find(&mut self, machine: Machine) -> Rc<Machine> {
        self.machines.add_or_find(machine)
    }

    /// Rebuild the machine set. Returns the host it was rebuilt from.
    ///
    /// The set is cleared before anything is tried, so a failed rebuild
    /// leaves the cluster empty.
    pub fn discover(&mut self) -> Option<String> {
        let mut known_hosts: Vec<String> = self.ctx.settings.fleet_host.iter().cloned().collect();
        for host in self.fleet_hosts() {
            if !known_hosts.contains(&host) {
                known_hosts.push(host);
            }
        }
        self.machines.clear();

        let recovered = match self.build_from(&known_hosts) {
            Some(host) => Some(host),
            None => {
                let directory = self.ctx.discovery.hosts();
                self.build_from(&directory)
            }
        };
        match recovered {
            Some(ref host) => info!("Successfully recovered from host: {:?}", host),
            None => warn!("Unable to recover! No fleet host answered"),
        }
        recovered
    }

    /// Rebuild from the first candidate whose `list-machines` succeeds.
    ///
    /// Candidates are deduplicated and blank entries dropped, order kept.
    /// Any error from a candidate is logged and ends the whole attempt:
    /// later candidates in this call are not tried.
    pub fn build_from<I>(&mut self, candidates: I) -> Option<String>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut hosts: Vec<String> = Vec::new();
        for candidate in candidates {
            let host = candidate.as_ref().trim();
            if !host.is_empty() && !hosts.iter().any(|h| h == host) {
                hosts.push(host.to_string());
            }
        }
        info!("building from hosts: {:?}", hosts);

        for host in &hosts {
            let fetcher = Fetcher::new(host.as_str(), Rc::clone(&self.ctx));
            match fetcher.fetch_machines(self) {
                Ok(true) => {
                    info!("built successfully from host: {:?}", host);
                    return Some(host.clone());
                }
                Ok(false) => debug!(host = %host, "list-machines failed, trying next host"),
                Err(e) => {
                    error!("ERROR building from hosts: {:?}", hosts);
                    error!(host = %host, "{}", e);
                    error!("{}", error_chain(&e));
                    return None;
                }
            }
        }
        None
    }
}
