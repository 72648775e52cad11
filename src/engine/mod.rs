//! Reconciliation engines.
//!
//! [`PushEngine`] converges replicas onto one authoritative file;
//! [`PullEngine`] converges a local directory onto a remote folder. Both
//! report one [`Outcome`] per unit of work and never let one unit's failure
//! stop the others.

mod pull;
mod push;

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

pub use pull::PullEngine;
pub use push::{DEFAULT_MAX_PARALLEL, PushEngine, PushOptions};

use crate::error::{Result, SyncError};

/// Default bound on one unit of work.
pub const DEFAULT_UNIT_TIMEOUT: Duration = Duration::from_secs(60);

/// What happened to one replica or file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Already converged; nothing written, no reload.
    Unchanged,
    /// Target did not have the file and now does.
    Created,
    /// Target content was replaced.
    Updated,
    /// Target file was removed.
    Deleted,
    /// The unit failed; the reason is the error message.
    Failed(String),
}

impl Outcome {
    /// Returns `true` for outcomes that changed the target.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        matches!(self, Self::Created | Self::Updated | Self::Deleted)
    }

    /// Returns `true` for [`Outcome::Failed`].
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unchanged => f.write_str("unchanged"),
            Self::Created => f.write_str("created"),
            Self::Updated => f.write_str("updated"),
            Self::Deleted => f.write_str("deleted"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

impl From<SyncError> for Outcome {
    fn from(e: SyncError) -> Self {
        Self::Failed(e.to_string())
    }
}

/// Per-unit outcomes of one run, keyed by replica host or file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    outcomes: BTreeMap<String, Outcome>,
}

impl Report {
    /// Records the outcome for `unit`, replacing any earlier one.
    pub fn record(&mut self, unit: impl Into<String>, outcome: Outcome) {
        self.outcomes.insert(unit.into(), outcome);
    }

    /// Outcome for `unit`, if it was part of the run.
    #[must_use]
    pub fn get(&self, unit: &str) -> Option<&Outcome> {
        self.outcomes.get(unit)
    }

    /// All outcomes, ordered by unit name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Outcome)> {
        self.outcomes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of units in the run.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    /// Returns `true` if the run had no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Number of units that changed their target.
    #[must_use]
    pub fn mutations(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_mutation()).count()
    }

    /// Number of failed units.
    #[must_use]
    pub fn failures(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_failure()).count()
    }
}

/// Runs `work` for `unit`, failing it with [`SyncError::Timeout`] after `limit`.
async fn bounded<T>(unit: &str, limit: Duration, work: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::time::timeout(limit, work)
        .await
        .unwrap_or_else(|_| {
            Err(SyncError::Timeout {
                unit: unit.to_string(),
                after: limit,
            })
        })
}

/// Fires a reload after a confirmed mutation, bounded by `limit`.
///
/// A failed or timed-out reload is only logged: the mutation stands and the
/// caller keeps its outcome.
async fn reload_after_mutation<F>(unit: &str, limit: Duration, reload: F)
where
    F: Future<Output = Result<()>>,
{
    if let Err(e) = bounded(unit, limit, reload).await {
        tracing::warn!(unit = %unit, error = %e, "Reload failed; resolver is stale until the next successful reload");
    }
}
