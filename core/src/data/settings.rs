use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;
use crate::types::config::Settings;

pub const ENV_FLEET_HOST: &str = "FLEET_HOST";
pub const ENV_DISCOVERY_URL: &str = "FLEET_DISCOVERY_URL";
pub const ENV_RUNNER: &str = "FLEET_RUNNER";


/// Returns sensible defaults for all settings fields.
pub fn default_settings() -> Settings {
    Settings::default()
}


/// Load `Settings` from a YAML file. Missing keys take their defaults.
pub fn load(path: &Path) -> Result<Settings, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "loaded settings");
    parse(&content)
}


/// Save `Settings` to a YAML file.
pub fn save(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    let content = serialize(settings)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}


/// Parse settings from YAML text. Blank input gives the defaults.
pub fn parse(content: &str) -> Result<Settings, ConfigError> {
    if content.trim().is_empty() {
        return Ok(default_settings());
    }
    let mut settings: Settings = serde_yaml::from_str(content)?;
    normalize(&mut settings);
    Ok(settings)
}


pub fn serialize(settings: &Settings) -> Result<String, ConfigError> {
    Ok(serde_yaml::to_string(settings)?)
}


/// Overlay `FLEET_HOST`, `FLEET_DISCOVERY_URL` and `FLEET_RUNNER` from the
/// process environment.
pub fn apply_env(settings: &mut Settings) -> Result<(), ConfigError> {
    apply_env_from(settings, |key| std::env::var(key).ok())
}


/// `apply_env` with an explicit lookup.
pub fn apply_env_from<F>(settings: &mut Settings, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(host) = lookup(ENV_FLEET_HOST) {
        settings.fleet_host = Some(host);
    }
    if let Some(url) = lookup(ENV_DISCOVERY_URL) {
        settings.discovery_url = Some(url);
    }
    if let Some(runner) = lookup(ENV_RUNNER) {
        settings.runner = runner.parse()?;
    }
    normalize(settings);
    Ok(())
}


/// Blank optional strings mean "not configured".
fn normalize(settings: &mut Settings) {
    fn blank_to_none(value: &mut Option<String>) {
        if value.as_deref().map(|v| v.trim().is_empty()).unwrap_or(false) {
            *value = None;
        }
    }
    blank_to_none(&mut settings.fleet_host);
    blank_to_none(&mut settings.discovery_url);
    blank_to_none(&mut settings.ssh.identity_file);
}
