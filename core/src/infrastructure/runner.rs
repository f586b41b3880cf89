//! Command runner abstraction for executing commands against a fleet host.
//!
//! `CommandRunner` is the trait every remote interaction goes through.
//! `ShellRunner` runs the tokens as a local process, `SshRunner` runs them on
//! the target host over ssh. `MockRunner` is the test double that records
//! calls and returns scripted responses.

use std::cell::RefCell;
use std::collections::VecDeque;

use super::process::{execute, shell_join};
use crate::error::TransportError;
use crate::types::config::SshSettings;


// ---------------------------------------------------------------------------
// RunOutput / SshOptions
// ---------------------------------------------------------------------------

/// Result of a command that actually ran (whatever its exit status).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl RunOutput {
    /// Exit code 0 with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        RunOutput {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    /// Non-zero exit with the given stderr.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        RunOutput {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Per-call connection overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SshOptions {
    pub port: Option<u16>,
}

impl SshOptions {
    pub fn port(port: u16) -> Self {
        SshOptions { port: Some(port) }
    }
}


// ---------------------------------------------------------------------------
// CommandRunner
// ---------------------------------------------------------------------------

/// Executes a command for a target host.
///
/// `Err` means the command could not be run at all. A command that ran and
/// failed is `Ok` with a non-zero `exit_code`.
pub trait CommandRunner {
    fn run(
        &self,
        command: &[String],
        host: &str,
        options: Option<&SshOptions>,
    ) -> Result<RunOutput, TransportError>;
}

/// Runs the command as a local process. The host is only used to label
/// errors; fleetctl itself is pointed at it with `--tunnel`.
pub struct ShellRunner;

impl CommandRunner for ShellRunner {
    fn run(
        &self,
        command: &[String],
        host: &str,
        _options: Option<&SshOptions>,
    ) -> Result<RunOutput, TransportError> {
        let (program, args) = command
            .split_first()
            .ok_or_else(|| TransportError::new(host, "empty command"))?;
        execute(program, args, host)
    }
}

/// Runs the command on the host over ssh.
pub struct SshRunner {
    settings: SshSettings,
}

/// ssh reserves this exit code for its own failures.
const SSH_FAILURE: i32 = 255;

impl SshRunner {
    pub fn new(settings: SshSettings) -> Self {
        SshRunner { settings }
    }

    /// Base ssh arguments (port, key, timeouts, user@host) without a command.
    pub fn ssh_args(&self, host: &str, options: Option<&SshOptions>) -> Vec<String> {
        let port = options
            .and_then(|o| o.port)
            .unwrap_or(self.settings.port);
        let mut args = vec![
            "-p".to_string(),
            port.to_string(),
            "-o".to_string(),
            "StrictHostKeyChecking=no".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
        ];
        if let Some(ref key) = self.settings.identity_file {
            args.push("-i".to_string());
            args.push(key.clone());
        }
        args.push(format!("{}@{}", self.settings.user, host));
        args
    }
}

impl CommandRunner for SshRunner {
    fn run(
        &self,
        command: &[String],
        host: &str,
        options: Option<&SshOptions>,
    ) -> Result<RunOutput, TransportError> {
        let mut args = self.ssh_args(host, options);
        args.push("--".to_string());
        args.push(shell_join(command));
        let output = execute("ssh", &args, host)?;
        if output.exit_code == SSH_FAILURE {
            return Err(TransportError::new(host, output.stderr.trim().to_string()));
        }
        Ok(output)
    }
}


// ---------------------------------------------------------------------------
// MockRunner
// ---------------------------------------------------------------------------

/// One call seen by a `MockRunner`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub host: String,
    pub command: Vec<String>,
    pub options: Option<SshOptions>,
}

struct Script {
    host: Option<String>,
    subcommand: String,
    responses: VecDeque<Result<RunOutput, TransportError>>,
}

/// Test-double runner that records calls and returns scripted responses.
///
/// Scripts match on host (or any host) and on a token that must appear in
/// the command. Responses are served in order; the last one repeats.
/// Unscripted calls succeed with empty output.
#[derive(Default)]
pub struct MockRunner {
    scripts: RefCell<Vec<Script>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl MockRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a response for `subcommand` on `host`.
    pub fn on(self, host: &str, subcommand: &str, response: Result<RunOutput, TransportError>) -> Self {
        self.push_script(Some(host), subcommand, response);
        self
    }

    /// Script a response for `subcommand` on any host.
    pub fn on_any(self, subcommand: &str, response: Result<RunOutput, TransportError>) -> Self {
        self.push_script(None, subcommand, response);
        self
    }

    /// Add a response after construction.
    pub fn respond(&self, host: &str, subcommand: &str, response: Result<RunOutput, TransportError>) {
        self.push_script(Some(host), subcommand, response);
    }

    fn push_script(&self, host: Option<&str>, subcommand: &str, response: Result<RunOutput, TransportError>) {
        let mut scripts = self.scripts.borrow_mut();
        let existing = scripts
            .iter_mut()
            .find(|s| s.host.as_deref() == host && s.subcommand == subcommand);
        match existing {
            Some(script) => script.responses.push_back(response),
            None => scripts.push(Script {
                host: host.map(str::to_string),
                subcommand: subcommand.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    /// Hosts in call order.
    pub fn hosts_called(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|c| c.host.clone()).collect()
    }

    /// Calls whose command contains `token`.
    pub fn calls_with(&self, token: &str) -> Vec<RecordedCall> {
        self.calls
            .borrow()
            .iter()
            .filter(|c| c.command.iter().any(|t| t == token))
            .cloned()
            .collect()
    }
}

impl CommandRunner for MockRunner {
    fn run(
        &self,
        command: &[String],
        host: &str,
        options: Option<&SshOptions>,
    ) -> Result<RunOutput, TransportError> {
        self.calls.borrow_mut().push(RecordedCall {
            host: host.to_string(),
            command: command.to_vec(),
            options: options.cloned(),
        });
        let mut scripts = self.scripts.borrow_mut();
        // host-specific scripts win over wildcards
        let position = scripts
            .iter()
            .position(|s| s.host.as_deref() == Some(host) && command.contains(&s.subcommand))
            .or_else(|| {
                scripts
                    .iter()
                    .position(|s| s.host.is_none() && command.contains(&s.subcommand))
            });
        match position {
            Some(i) => {
                let responses = &mut scripts[i].responses;
                if responses.len() > 1 {
                    responses.pop_front().unwrap_or_else(|| Ok(RunOutput::ok("")))
                } else {
                    responses.front().cloned().unwrap_or_else(|| Ok(RunOutput::ok("")))
                }
            }
            None => Ok(RunOutput::ok("")),
        }
    }
}
