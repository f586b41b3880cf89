//! Top-level façade: a cluster, the units scheduled on it, and the unit
//! lifecycle commands.

use std::path::PathBuf;
use std::rc::Rc;

use tracing::{info, warn};

use super::cluster::Cluster;
use super::context::FleetContext;
use crate::error::{FleetError, Result};
use crate::fleetctl::command::{UnitCommand, DESTROY};
use crate::fleetctl::fetcher::Fetcher;
use crate::identity_set::IdentitySet;
use crate::infrastructure::runner::RunOutput;
use crate::infrastructure::staging::with_staged;
use crate::types::config::RunnerKind;
use crate::types::machine::Machine;
use crate::types::unit::{ControllerId, Unit};

fn new_unit_set() -> IdentitySet<Unit> {
    IdentitySet::with_identity(Unit::same_name)
}

/// Where `fetch_units` deposits what it parses.
pub(crate) struct UnitTarget<'a> {
    pub cluster: &'a mut Cluster,
    pub units: &'a mut IdentitySet<Unit>,
    pub controller: ControllerId,
}

pub struct Controller {
    id: ControllerId,
    cluster: Cluster,
    /// `None` until first read and after every mutating unit command.
    units: Option<IdentitySet<Unit>>,
    ctx: Rc<FleetContext>,
}

impl Controller {
    pub fn new(ctx: Rc<FleetContext>) -> Self {
        Controller {
            id: ControllerId::next(),
            cluster: Cluster::new(Rc::clone(&ctx)),
            units: None,
            ctx,
        }
    }

    pub fn id(&self) -> ControllerId {
        self.id
    }

    pub fn cluster(&self) -> &Cluster {
        &self.cluster
    }

    pub fn cluster_mut(&mut self) -> &mut Cluster {
        &mut self.cluster
    }

    pub fn machines(&mut self) -> Vec<Rc<Machine>> {
        self.cluster.machines()
    }

    /// The unit set, fetched on first access and cached until a unit
    /// command invalidates it.
    pub fn units(&mut self) -> Result<&IdentitySet<Unit>> {
        if self.units.is_none() {
            self.cluster.machines();
            self.units = Some(new_unit_set());
            match self.cluster.fleet_host() {
                Some(host) => {
                    let fetcher = Fetcher::new(host, Rc::clone(&self.ctx));
                    if let Err(e) = fetcher.fetch_units(self) {
                        self.units = None;
                        return Err(e);
                    }
                }
                None => warn!("no fleet host reachable, unit list is empty"),
            }
        }
        Ok(&*self.units.get_or_insert_with(new_unit_set))
    }

    /// The cached unit set, if any; never fetches.
    pub fn cached_units(&self) -> Option<&IdentitySet<Unit>> {
        self.units.as_ref()
    }

    /// Rediscover the cluster and refetch every unit.
    ///
    /// Returns whether the unit listing succeeded; `Ok(false)` also covers
    /// the case where discovery found no host at all.
    pub fn sync(&mut self) -> Result<bool> {
        self.cluster.discover();
        self.units = Some(new_unit_set());
        let host = match self.cluster.fleet_host() {
            Some(host) => host,
            None => {
                warn!("sync found no reachable fleet host");
                return Ok(false);
            }
        };
        let fetcher = Fetcher::new(host, Rc::clone(&self.ctx));
        let result = fetcher.fetch_units(self);
        if result.is_err() {
            self.units = None;
        }
        result
    }

    /// The unit named exactly `name`.
    pub fn get(&mut self, name: &str) -> Result<Option<Rc<Unit>>> {
        Ok(self.units()?.find(|u| u.name == name))
    }

    /// Units currently scheduled on `machine`.
    pub fn units_on(&mut self, machine: &Machine) -> Result<Vec<Rc<Unit>>> {
        Ok(self
            .units()?
            .iter()
            .filter(|u| u.is_on(machine))
            .cloned()
            .collect())
    }

    pub fn start(&mut self, files: &[PathBuf]) -> Result<bool> {
        self.unitfile_operation(UnitCommand::Start, files)
    }

    pub fn submit(&mut self, files: &[PathBuf]) -> Result<bool> {
        self.unitfile_operation(UnitCommand::Submit, files)
    }

    pub fn load(&mut self, files: &[PathBuf]) -> Result<bool> {
        self.unitfile_operation(UnitCommand::Load, files)
    }

    pub fn destroy<S: AsRef<str>>(&mut self, names: &[S]) -> Result<bool> {
        self.clear_units();
        let host = self.command_host()?;
        let mut args = vec![DESTROY.to_string()];
        args.extend(names.iter().map(|n| n.as_ref().to_string()));
        let output = self.run_fleetctl(&host, &args)?;
        Ok(output.success())
    }

    pub(crate) fn unit_target(&mut self) -> UnitTarget<'_> {
        UnitTarget {
            cluster: &mut self.cluster,
            units: self.units.get_or_insert_with(new_unit_set),
            controller: self.id,
        }
    }

    fn clear_units(&mut self) {
        self.units = None;
    }

    /// Host for one-off commands: a known machine, else the configured
    /// default.
    fn command_host(&self) -> Result<String> {
        self.cluster
            .fleet_host()
            .or_else(|| self.ctx.settings.fleet_host.clone())
            .ok_or(FleetError::NoFleetHost)
    }

    fn run_fleetctl(&self, host: &str, args: &[String]) -> Result<RunOutput> {
        let command = self.ctx.fleetctl(host, args);
        info!(host, "fleetctl {}", args.join(" "));
        let output = self.ctx.runner.run(&command, host, None)?;
        if !output.success() {
            warn!(
                host,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "fleetctl {} failed",
                args.join(" ")
            );
        }
        Ok(output)
    }

    fn unitfile_operation(&mut self, command: UnitCommand, files: &[PathBuf]) -> Result<bool> {
        self.clear_units();
        let result = self.run_unitfile_command(command, files);
        self.clear_units();
        result
    }

    fn run_unitfile_command(&self, command: UnitCommand, files: &[PathBuf]) -> Result<bool> {
        let host = self.command_host()?;
        let with_paths = |paths: &[String]| -> Result<bool> {
            let mut args = vec![command.as_str().to_string()];
            args.extend(paths.iter().cloned());
            Ok(self.run_fleetctl(&host, &args)?.success())
        };
        match self.ctx.settings.runner {
            RunnerKind::Shell => {
                let local: Vec<String> = files
                    .iter()
                    .map(|f| f.to_string_lossy().into_owned())
                    .collect();
                with_paths(&local)
            }
            RunnerKind::Ssh => with_staged(self.ctx.stager.as_ref(), &host, files, with_paths),
        }
    }
}
