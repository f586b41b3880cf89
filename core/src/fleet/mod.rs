//! Cluster discovery and the controller façade built on top of it.

pub mod cluster;
pub mod context;
pub mod controller;
pub mod discovery;

pub use cluster::Cluster;
pub use context::FleetContext;
pub use controller::Controller;
pub use discovery::{Discovery, EtcdDiscovery, NoDiscovery, StaticDiscovery};
