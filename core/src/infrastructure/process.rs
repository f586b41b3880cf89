//! Local process spawning shared by the runners and the stager.

use std::process::Command;

use tracing::debug;

use super::runner::RunOutput;
use crate::error::TransportError;

/// Spawn `program args..` locally and wait for it. A spawn failure is a
/// transport failure attributed to `host`; a non-zero exit is not.
pub fn execute(program: &str, args: &[String], host: &str) -> Result<RunOutput, TransportError> {
    debug!(program, ?args, host, "spawning");
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| TransportError::new(host, format!("failed to execute {}: {}", program, e)))?;
    Ok(RunOutput {
        // killed by a signal
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Quote a token for a POSIX shell on the far side of an ssh hop.
pub fn shell_quote(token: &str) -> String {
    let plain = !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,@%+".contains(c));
    if plain {
        token.to_string()
    } else {
        format!("'{}'", token.replace('\'', r"'\''"))
    }
}

/// Join tokens into one remote shell command line.
pub fn shell_join(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| shell_quote(t))
        .collect::<Vec<_>>()
        .join(" ")
}
