//! Fetch, parse and link.
//!
//! A `Fetcher` is bound to one fleet host. It runs a fleetctl query there,
//! parses the table, and merges the resulting entities into a target
//! collection. Machines always go through `Cluster::add_or_find`, so a
//! unit's machine is the instance the cluster already tracks.
//!
//! Transport errors are not caught here; callers decide what a dead host
//! means.

use std::rc::Rc;

use tracing::{info, warn};

use super::command::{FULL, LIST_MACHINES, LIST_UNITS};
use super::table::{self, cell, Row};
use crate::error::{ParseError, Result};
use crate::fleet::cluster::Cluster;
use crate::fleet::context::FleetContext;
use crate::fleet::controller::Controller;
use crate::types::machine::Machine;
use crate::types::unit::Unit;

pub struct Fetcher {
    host: String,
    ctx: Rc<FleetContext>,
}

impl Fetcher {
    pub fn new(host: impl Into<String>, ctx: Rc<FleetContext>) -> Self {
        Fetcher {
            host: host.into(),
            ctx,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Run `fleetctl args..` on the bound host. `on_output` sees stdout only
    /// when the command exits 0. Returns whether it did.
    pub fn fetch<F>(&self, args: &[&str], on_output: F) -> Result<bool>
    where
        F: FnOnce(&str) -> Result<()>,
    {
        let command = self.ctx.fleetctl(&self.host, args);
        let output = self.ctx.runner.run(&command, &self.host, None)?;
        if !output.success() {
            warn!(
                host = %self.host,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "fleetctl {} failed",
                args.join(" ")
            );
            return Ok(false);
        }
        on_output(&output.stdout)?;
        Ok(true)
    }

    /// `list-machines` into `cluster`.
    pub fn fetch_machines(&self, cluster: &mut Cluster) -> Result<bool> {
        info!("Fetching machines from host: {:?}", self.host);
        self.fetch(&[LIST_MACHINES, FULL], |output| {
            parse_machines(output, cluster)?;
            Ok(())
        })
    }

    /// `list-units` into `controller`'s unit set, linking machines through
    /// its cluster.
    pub fn fetch_units(&self, controller: &mut Controller) -> Result<bool> {
        info!("Fetching units from host: {:?}", self.host);
        self.fetch(&[LIST_UNITS, FULL], |output| {
            parse_units(output, controller)?;
            Ok(())
        })
    }
}

fn required<'a>(row: &'a Row, column: &str, line: usize) -> std::result::Result<&'a str, ParseError> {
    cell(row, column).ok_or_else(|| ParseError::MissingField {
        line,
        field: column.to_string(),
    })
}

/// Build a machine per row and canonicalize it through `cluster`.
///
/// Every row is validated before the first machine is added, so a rejected
/// table leaves `cluster` untouched.
pub fn parse_machines(raw: &str, cluster: &mut Cluster) -> Result<Vec<Rc<Machine>>> {
    let rows = table::parse(raw)?;
    let cluster_id = cluster.id();
    let parsed = rows
        .iter()
        .map(|(line, row)| -> std::result::Result<Machine, ParseError> {
            let mut machine = Machine::new(required(row, "machine", *line)?, required(row, "ip", *line)?)
                .in_cluster(cluster_id);
            machine.metadata = cell(row, "metadata").map(str::to_string);
            Ok(machine)
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(parsed.into_iter().map(|m| cluster.add_or_find(m)).collect())
}

/// Split a `<id>/<ip>` machine reference.
pub fn split_machine_ref(reference: &str) -> std::result::Result<(&str, &str), ParseError> {
    match reference.split_once('/') {
        Some((id, ip)) if !id.is_empty() && !ip.is_empty() => Ok((id, ip)),
        _ => Err(ParseError::MachineRef(reference.to_string())),
    }
}

/// Build a unit per row, resolving its machine through the controller's
/// cluster, and add it to the controller's unit set.
///
/// Nothing is added to the cluster or the unit set unless every row parses.
pub fn parse_units(raw: &str, controller: &mut Controller) -> Result<Vec<Rc<Unit>>> {
    let rows = table::parse(raw)?;
    let target = controller.unit_target();
    let cluster_id = target.cluster.id();
    let controller_id = target.controller;
    let parsed = rows
        .iter()
        .map(|(line, row)| -> std::result::Result<(Unit, Option<Machine>), ParseError> {
            let machine = match cell(row, "machine") {
                Some(reference) => {
                    let (id, ip) = split_machine_ref(reference)?;
                    Some(Machine::new(id, ip).in_cluster(cluster_id))
                }
                None => None,
            };
            let text = |column: &str| cell(row, column).unwrap_or_default().to_string();
            let unit = Unit {
                name: required(row, "unit", *line)?.to_string(),
                state: text("state"),
                desired_state: text("dstate"),
                active: text("active"),
                sub_state: text("sub"),
                machine: None,
                controller: Some(controller_id),
            };
            Ok((unit, machine))
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut units = Vec::with_capacity(parsed.len());
    for (mut unit, machine) in parsed {
        unit.machine = machine.map(|m| target.cluster.add_or_find(m));
        units.push(target.units.add_or_find(unit));
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FleetError, TransportError};
    use crate::infrastructure::runner::{MockRunner, RunOutput};
    use crate::types::config::Settings;

    const HOST: &str = "8.8.8.8";

    const MACHINES: &str = "MACHINE\t\t\t\t\tIP\t\tMETADATA\n\
4ce83dd1b1c94d67af00ba264499b6d0\t10.240.190.254\t-\n\
aafdf1ed253844108ba4f10d75922f2b\t10.240.51.254\t-\n\
d44af62acaf347b4a1f26eeb0393fca3\t10.240.159.164\tregion=us-east\n";

    const UNITS: &str = "UNIT\t\t\tSTATE\t\tDSTATE\t\tMACHINE\t\t\t\t\tACTIVE\tSUB\n\
web.service\tlaunched\tlaunched\tabc/10.0.0.1\tactive\trunning\n\
db.service\tinactive\tinactive\t-\tinactive\tdead\n";

    fn context(runner: Rc<MockRunner>) -> Rc<FleetContext> {
        Rc::new(FleetContext::from_settings(Settings::default()).with_runner(runner))
    }

    #[test]
    fn fetch_runs_on_the_bound_host() {
        let runner = Rc::new(MockRunner::new());
        let fetcher = Fetcher::new(HOST, context(Rc::clone(&runner)));
        fetcher.fetch(&["list-machines", "-l"], |_| Ok(())).unwrap();
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].host, HOST);
        assert_eq!(calls[0].command, vec!["fleetctl", "list-machines", "-l"]);
    }

    #[test]
    fn fetch_yields_output_and_true_on_success() {
        let runner = Rc::new(MockRunner::new().on(HOST, "list-machines", Ok(RunOutput::ok("output"))));
        let fetcher = Fetcher::new(HOST, context(runner));
        let mut seen = None;
        let ok = fetcher
            .fetch(&["list-machines", "-l"], |out| {
                seen = Some(out.to_string());
                Ok(())
            })
            .unwrap();
        assert!(ok);
        assert_eq!(seen.as_deref(), Some("output"));
    }

    #[test]
    fn fetch_returns_false_without_yielding_on_failure() {
        let runner = Rc::new(MockRunner::new().on(HOST, "list-machines", Ok(RunOutput::failed(42, "nope"))));
        let fetcher = Fetcher::new(HOST, context(runner));
        let mut called = false;
        let ok = fetcher
            .fetch(&["list-machines", "-l"], |_| {
                called = true;
                Ok(())
            })
            .unwrap();
        assert!(!ok);
        assert!(!called);
    }

    #[test]
    fn fetch_propagates_transport_errors() {
        let runner = Rc::new(MockRunner::new().on(
            HOST,
            "list-machines",
            Err(TransportError::new(HOST, "connection refused")),
        ));
        let fetcher = Fetcher::new(HOST, context(runner));
        let err = fetcher.fetch(&["list-machines", "-l"], |_| Ok(())).unwrap_err();
        assert!(matches!(err, FleetError::Transport(_)));
    }

    #[test]
    fn fetch_machines_merges_into_cluster() {
        let runner = Rc::new(MockRunner::new().on(HOST, "list-machines", Ok(RunOutput::ok(MACHINES))));
        let ctx = context(runner);
        let mut cluster = Cluster::new(Rc::clone(&ctx));
        let existing = cluster.add_or_find(Machine::new("aafdf1ed253844108ba4f10d75922f2b", "10.240.51.254"));

        assert!(Fetcher::new(HOST, ctx).fetch_machines(&mut cluster).unwrap());

        assert_eq!(
            cluster.fleet_hosts(),
            vec!["10.240.51.254", "10.240.190.254", "10.240.159.164"]
        );
        let again = cluster
            .machine_set()
            .find(|m| m.id == "aafdf1ed253844108ba4f10d75922f2b")
            .unwrap();
        assert!(Rc::ptr_eq(&existing, &again));
    }

    #[test]
    fn fetch_machines_false_leaves_cluster_untouched() {
        let runner = Rc::new(MockRunner::new().on(HOST, "list-machines", Ok(RunOutput::failed(1, ""))));
        let ctx = context(runner);
        let mut cluster = Cluster::new(Rc::clone(&ctx));
        assert!(!Fetcher::new(HOST, ctx).fetch_machines(&mut cluster).unwrap());
        assert!(cluster.machine_set().is_empty());
    }

    #[test]
    fn parse_machines_maps_columns() {
        let ctx = context(Rc::new(MockRunner::new()));
        let mut cluster = Cluster::new(ctx);
        let machines = parse_machines(MACHINES, &mut cluster).unwrap();
        assert_eq!(machines.len(), 3);
        assert_eq!(machines[0].id, "4ce83dd1b1c94d67af00ba264499b6d0");
        assert_eq!(machines[0].ip, "10.240.190.254");
        assert_eq!(machines[0].metadata, None);
        assert_eq!(machines[0].cluster, Some(cluster.id()));
        assert_eq!(machines[2].metadata.as_deref(), Some("region=us-east"));
    }

    #[test]
    fn parse_machines_requires_ip() {
        let ctx = context(Rc::new(MockRunner::new()));
        let mut cluster = Cluster::new(ctx);
        let err = parse_machines("MACHINE\tIP\nabc\t-\n", &mut cluster).unwrap_err();
        assert!(matches!(
            err,
            FleetError::Parse(ParseError::MissingField { line: 2, .. })
        ));
    }

    #[test]
    fn rejected_machine_table_adds_nothing() {
        let ctx = context(Rc::new(MockRunner::new()));
        let mut cluster = Cluster::new(ctx);
        let err = parse_machines("MACHINE\tIP\nabc\t10.0.0.9\nxyz\t-\n", &mut cluster).unwrap_err();
        assert!(matches!(
            err,
            FleetError::Parse(ParseError::MissingField { line: 3, .. })
        ));
        assert!(cluster.machine_set().is_empty());
    }

    #[test]
    fn missing_field_reports_raw_line_number() {
        let ctx = context(Rc::new(MockRunner::new()));
        let mut cluster = Cluster::new(ctx);
        let raw = "MACHINE\tIP\n\nabc\t10.0.0.9\nxyz\t-\n";
        let err = parse_machines(raw, &mut cluster).unwrap_err();
        assert!(matches!(
            err,
            FleetError::Parse(ParseError::MissingField { line: 4, ref field }) if field == "ip"
        ));
    }

    #[test]
    fn rejected_unit_table_adds_nothing() {
        let table = "UNIT\tSTATE\tMACHINE\n\
web.service\tlaunched\tabc/10.0.0.1\n\
-\tlaunched\tdef/10.0.0.2\n";
        let runner = Rc::new(MockRunner::new().on(HOST, "list-units", Ok(RunOutput::ok(table))));
        let ctx = context(runner);
        let mut controller = Controller::new(Rc::clone(&ctx));
        let err = Fetcher::new(HOST, ctx).fetch_units(&mut controller).unwrap_err();
        assert!(matches!(
            err,
            FleetError::Parse(ParseError::MissingField { line: 3, .. })
        ));
        assert!(controller.cluster().machine_set().is_empty());
        assert!(controller.cached_units().map(|u| u.is_empty()).unwrap_or(true));
    }

    #[test]
    fn fetch_units_links_to_cluster_machine() {
        let runner = Rc::new(MockRunner::new().on(HOST, "list-units", Ok(RunOutput::ok(UNITS))));
        let ctx = context(runner);
        let mut controller = Controller::new(Rc::clone(&ctx));
        let canonical = controller
            .cluster_mut()
            .add_or_find(Machine::new("abc", "10.0.0.1").with_metadata("role=web"));

        assert!(Fetcher::new(HOST, ctx).fetch_units(&mut controller).unwrap());

        let web = controller.cached_units().unwrap().find(|u| u.name == "web.service").unwrap();
        let machine = web.machine.as_ref().unwrap();
        assert!(Rc::ptr_eq(machine, &canonical));
        assert_eq!(machine.metadata.as_deref(), Some("role=web"));
        assert_eq!(web.state, "launched");
        assert_eq!(web.desired_state, "launched");
        assert_eq!(web.active, "active");
        assert_eq!(web.sub_state, "running");
        assert_eq!(web.controller, Some(controller.id()));
    }

    #[test]
    fn fetch_units_adds_unknown_machines_to_cluster() {
        let runner = Rc::new(MockRunner::new().on(HOST, "list-units", Ok(RunOutput::ok(UNITS))));
        let ctx = context(runner);
        let mut controller = Controller::new(Rc::clone(&ctx));
        Fetcher::new(HOST, ctx).fetch_units(&mut controller).unwrap();

        let known = controller.cluster().machine_set().find(|m| m.id == "abc").unwrap();
        let units = controller.cached_units().unwrap();
        let web = units.find(|u| u.name == "web.service").unwrap();
        assert!(Rc::ptr_eq(web.machine.as_ref().unwrap(), &known));
        let db = units.find(|u| u.name == "db.service").unwrap();
        assert!(db.machine.is_none());
    }

    #[test]
    fn fetch_units_merges_with_existing_units() {
        let runner = Rc::new(MockRunner::new().on(HOST, "list-units", Ok(RunOutput::ok(UNITS))));
        let ctx = context(runner);
        let mut controller = Controller::new(Rc::clone(&ctx));
        let earlier = controller.unit_target().units.add_or_find(Unit::new("db.service"));
        controller.unit_target().units.add_or_find(Unit::new("cache.service"));

        Fetcher::new(HOST, ctx).fetch_units(&mut controller).unwrap();

        let units = controller.cached_units().unwrap();
        let names: Vec<&str> = units.iter().map(|u| u.name.as_str()).collect();
        assert_eq!(names, vec!["db.service", "cache.service", "web.service"]);
        assert!(Rc::ptr_eq(&units.find(|u| u.name == "db.service").unwrap(), &earlier));
    }

    #[test]
    fn malformed_machine_reference_fails_the_fetch() {
        let table = "UNIT\tMACHINE\nweb.service\tabc\n";
        let runner = Rc::new(MockRunner::new().on(HOST, "list-units", Ok(RunOutput::ok(table))));
        let ctx = context(runner);
        let mut controller = Controller::new(Rc::clone(&ctx));
        let err = Fetcher::new(HOST, ctx).fetch_units(&mut controller).unwrap_err();
        assert!(matches!(err, FleetError::Parse(ParseError::MachineRef(_))));
    }

    #[test]
    fn split_machine_reference() {
        assert_eq!(split_machine_ref("abc/10.0.0.1").unwrap(), ("abc", "10.0.0.1"));
        assert!(split_machine_ref("abc").is_err());
        assert!(split_machine_ref("/10.0.0.1").is_err());
    }
}
