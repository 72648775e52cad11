//! Error types.

use std::time::Duration;

use thiserror::Error;

/// Result alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Errors returned by sync operations.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid configuration value. Fatal before any work starts.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// A replica or the repository API could not be reached.
    #[error("cannot connect to {target}: {message}")]
    Connect {
        /// Host or endpoint that failed.
        target: String,
        /// Transport-level detail.
        message: String,
    },

    /// Local filesystem I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A remote command or API call completed but reported failure.
    #[error("{target}: {message}")]
    Remote {
        /// Host, file or endpoint that reported the failure.
        target: String,
        /// Remote-side detail (stderr, HTTP status).
        message: String,
    },

    /// HTTP transport failure talking to the repository API.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A digest received from a remote is not 64 hex characters.
    #[error("invalid content hash: {0:?}")]
    InvalidHash(String),

    /// The resolver reload command failed.
    #[error("reload failed: {0}")]
    Reload(String),

    /// A unit of work exceeded the run-level timeout.
    #[error("{unit} timed out after {after:?}")]
    Timeout {
        /// Replica or file name.
        unit: String,
        /// Configured limit.
        after: Duration,
    },
}

impl SyncError {
    /// Returns `true` if the underlying I/O error is `NotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }

    /// Returns `true` if the underlying I/O error is `PermissionDenied`.
    #[must_use]
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::PermissionDenied)
    }

    pub(crate) fn remote(target: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Remote {
            target: target.into(),
            message: message.into(),
        }
    }
}
