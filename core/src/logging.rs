//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::sync::Mutex;

use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

use crate::error::ConfigError;
use crate::types::config::LogSettings;

/// Install the global subscriber described by `settings`. `RUST_LOG`, when
/// set, wins over the configured level. Calling this twice is harmless.
pub fn init(settings: &LogSettings) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.level));

    match settings.file {
        Some(ref path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| ConfigError::Write {
                    path: path.clone(),
                    source,
                })?;
            let _ = Registry::default()
                .with(filter)
                .with(subscriber_fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
                .try_init();
        }
        None => {
            let _ = Registry::default()
                .with(filter)
                .with(subscriber_fmt::layer().with_writer(std::io::stderr))
                .try_init();
        }
    }
    Ok(())
}
