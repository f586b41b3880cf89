use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use super::machine::Machine;

/// Key of the `Controller` that owns a unit set. Association only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControllerId(u64);

impl ControllerId {
    pub fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        ControllerId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A fleet unit as reported by `fleetctl list-units -l`.
#[derive(Debug, Clone, Default)]
pub struct Unit {
    pub name: String,
    pub state: String,
    pub desired_state: String,
    pub active: String,
    pub sub_state: String,
    /// The canonical instance held by the owning cluster's machine set.
    pub machine: Option<Rc<Machine>>,
    pub controller: Option<ControllerId>,
}

impl Unit {
    pub fn new(name: impl Into<String>) -> Self {
        Unit {
            name: name.into(),
            ..Unit::default()
        }
    }

    /// Identity used by unit sets: names are unique within a controller.
    pub fn same_name(a: &Unit, b: &Unit) -> bool {
        a.name == b.name
    }

    pub fn is_on(&self, machine: &Machine) -> bool {
        self.machine.as_ref().map(|m| m.id == machine.id).unwrap_or(false)
    }

    pub fn view(&self) -> UnitView<'_> {
        UnitView {
            name: &self.name,
            state: &self.state,
            desired_state: &self.desired_state,
            active: &self.active,
            sub_state: &self.sub_state,
            machine: self.machine.as_ref().map(|m| format!("{}/{}", m.id, m.ip)),
        }
    }
}

impl PartialEq for Unit {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.state == other.state
            && self.desired_state == other.desired_state
            && self.active == other.active
            && self.sub_state == other.sub_state
            && self.machine == other.machine
    }
}

/// Serializable projection of a `Unit`; the machine is rendered `<id>/<ip>`.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UnitView<'a> {
    pub name: &'a str,
    pub state: &'a str,
    pub desired_state: &'a str,
    pub active: &'a str,
    pub sub_state: &'a str,
    pub machine: Option<String>,
}
