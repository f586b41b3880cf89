//! Fleet core: a client-side model of a fleet-managed CoreOS cluster.
//!
//! The model is rebuilt on demand by running `fleetctl` on a reachable
//! cluster host and parsing its tabular output. Hosts are reached either
//! by running fleetctl locally with `--tunnel` or by running it on the host
//! over ssh.
//!
//! # Modules
//!
//! - [`fleet`] — cluster discovery, the controller, collaborator wiring
//! - [`fleetctl`] — command construction, table parsing, fetchers
//! - [`identity_set`] — shared-instance collection keyed by identity
//! - [`infrastructure`] — command runners and unit-file staging
//! - [`data`] — settings persistence
//! - [`types`] — machines, units, settings

pub mod data;
pub mod error;
pub mod fleet;
pub mod fleetctl;
pub mod identity_set;
pub mod infrastructure;
pub mod logging;
pub mod types;

pub use error::{FleetError, Result};
pub use fleet::{Cluster, Controller, FleetContext};
pub use identity_set::IdentitySet;
pub use types::{Machine, Settings, Unit};
