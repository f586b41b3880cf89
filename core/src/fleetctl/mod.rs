//! Everything that knows fleetctl's command line and its table output.

pub mod command;
pub mod fetcher;
pub mod table;

pub use command::UnitCommand;
pub use fetcher::Fetcher;
