//! Tracing subscriber setup.

use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use crate::error::{Result, SyncError};

/// Where and how much to log.
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Filter directive such as `info` or `resolver_sync=debug`. `None`
    /// falls back to `RUST_LOG`, then `info`.
    pub level: Option<String>,
    /// File appended to in addition to stderr.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Builds the filter this config describes.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `level` is not a valid directive.
    pub fn filter(&self) -> Result<EnvFilter> {
        match &self.level {
            Some(level) => EnvFilter::try_new(normalize_level(level))
                .map_err(|e| SyncError::InvalidConfig(format!("log level {level:?}: {e}"))),
            None => Ok(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))),
        }
    }
}

/// Maps Python-logging level names onto tracing's.
fn normalize_level(level: &str) -> String {
    match level.trim().to_ascii_lowercase().as_str() {
        "warning" => "warn".to_string(),
        "critical" | "fatal" => "error".to_string(),
        "notset" => "trace".to_string(),
        other => other.to_string(),
    }
}

/// Installs the global subscriber: stderr always, plus the log file if set.
///
/// # Errors
///
/// Returns [`SyncError::InvalidConfig`] for a bad level and
/// [`SyncError::Io`] if the log file cannot be opened.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = config.filter()?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match &config.file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            builder
                .with_writer(std::io::stderr.and(Mutex::new(file)))
                .with_ansi(false)
                .init();
        }
        None => builder.with_writer(std::io::stderr).init(),
    }
    Ok(())
}
