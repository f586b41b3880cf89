pub mod config;
pub mod machine;
pub mod unit;

pub use config::{LogSettings, RunnerKind, Settings, SshSettings};
pub use machine::{ClusterId, Machine, MachineView};
pub use unit::{ControllerId, Unit, UnitView};
