//! Settings plus collaborators, built once and shared by `Rc`.

use std::fmt;
use std::rc::Rc;

use super::discovery::{Discovery, EtcdDiscovery, NoDiscovery};
use crate::fleetctl::command::fleetctl_tokens;
use crate::infrastructure::runner::{CommandRunner, ShellRunner, SshRunner};
use crate::infrastructure::staging::{FileStager, ScpStager};
use crate::types::config::{RunnerKind, Settings};

/// Everything a `Cluster`, `Controller` or `Fetcher` needs from the outside.
pub struct FleetContext {
    pub settings: Settings,
    pub runner: Rc<dyn CommandRunner>,
    pub stager: Rc<dyn FileStager>,
    pub discovery: Rc<dyn Discovery>,
}

impl fmt::Debug for FleetContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FleetContext")
            .field("settings", &self.settings)
            .finish()
    }
}

impl FleetContext {
    /// Production wiring for `settings`: shell or ssh runner, scp staging,
    /// etcd discovery when a url is configured.
    pub fn from_settings(settings: Settings) -> Self {
        let runner: Rc<dyn CommandRunner> = match settings.runner {
            RunnerKind::Shell => Rc::new(ShellRunner),
            RunnerKind::Ssh => Rc::new(SshRunner::new(settings.ssh.clone())),
        };
        let discovery: Rc<dyn Discovery> = match settings.discovery_url {
            Some(ref url) => Rc::new(EtcdDiscovery::new(url.clone())),
            None => Rc::new(NoDiscovery),
        };
        FleetContext {
            stager: Rc::new(ScpStager::new(settings.ssh.clone())),
            settings,
            runner,
            discovery,
        }
    }

    pub fn with_runner<R: CommandRunner + 'static>(mut self, runner: Rc<R>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_stager<S: FileStager + 'static>(mut self, stager: Rc<S>) -> Self {
        self.stager = stager;
        self
    }

    pub fn with_discovery<D: Discovery + 'static>(mut self, discovery: Rc<D>) -> Self {
        self.discovery = discovery;
        self
    }

    /// Token vector for `fleetctl args..` against `host` in the configured
    /// execution mode.
    pub fn fleetctl<S: AsRef<str>>(&self, host: &str, args: &[S]) -> Vec<String> {
        fleetctl_tokens(&self.settings, host, args)
    }
}
