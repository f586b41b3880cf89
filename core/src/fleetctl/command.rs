//! fleetctl invocations.

use crate::types::config::{RunnerKind, Settings};

pub const LIST_MACHINES: &str = "list-machines";
pub const LIST_UNITS: &str = "list-units";
pub const DESTROY: &str = "destroy";
/// Full-length ids and `<id>/<ip>` machine references.
pub const FULL: &str = "-l";

/// Unit file operations that take unit definitions as arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitCommand {
    Start,
    Submit,
    Load,
}

impl UnitCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitCommand::Start => "start",
            UnitCommand::Submit => "submit",
            UnitCommand::Load => "load",
        }
    }
}

/// Token vector running `fleetctl args..` against `host`.
///
/// With the shell runner fleetctl runs locally and tunnels to the host;
/// with the ssh runner the tokens are executed on the host itself.
pub fn fleetctl_tokens<S: AsRef<str>>(settings: &Settings, host: &str, args: &[S]) -> Vec<String> {
    let mut tokens = vec![settings.fleetctl.clone()];
    if settings.runner == RunnerKind::Shell {
        tokens.push("--tunnel".to_string());
        tokens.push(host.to_string());
    }
    tokens.extend(args.iter().map(|a| a.as_ref().to_string()));
    tokens
}
