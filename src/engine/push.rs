//! One authoritative file pushed to many replicas.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use super::{DEFAULT_UNIT_TIMEOUT, Outcome, Report, bounded, reload_after_mutation};
use crate::error::Result;
use crate::hash::ContentHash;
use crate::remote::PushTarget;

/// Default cap on replicas processed at once.
pub const DEFAULT_MAX_PARALLEL: usize = 8;

/// Concurrency and timeout knobs for [`PushEngine`].
#[derive(Debug, Clone, Copy)]
pub struct PushOptions {
    /// Upper bound on concurrently processed replicas.
    pub max_parallel: usize,
    /// Limit on one replica's hash-compare-push sequence, and separately on
    /// its reload.
    pub unit_timeout: Duration,
}

impl Default for PushOptions {
    fn default() -> Self {
        Self {
            max_parallel: DEFAULT_MAX_PARALLEL,
            unit_timeout: DEFAULT_UNIT_TIMEOUT,
        }
    }
}

/// Converges replicas onto a local authoritative file.
///
/// Strictly one-directional: replicas never lose files and nothing is read
/// back from them. Each replica reloads at most once per run, and only if
/// its copy was written.
#[derive(Debug, Clone)]
pub struct PushEngine {
    source: PathBuf,
    remote_path: String,
    options: PushOptions,
}

impl PushEngine {
    /// Pushes `source` to `remote_path` on each replica.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, remote_path: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            remote_path: remote_path.into(),
            options: PushOptions::default(),
        }
    }

    /// Overrides concurrency and timeout.
    #[must_use]
    pub const fn with_options(mut self, options: PushOptions) -> Self {
        self.options = options;
        self
    }

    /// Reconciles every replica and reports each one's outcome.
    ///
    /// Replicas run concurrently up to `max_parallel`. A replica that fails,
    /// panics or times out is reported as [`Outcome::Failed`] without
    /// affecting the rest.
    pub async fn run(&self, replicas: Vec<Arc<dyn PushTarget>>) -> Report {
        let mut report = Report::default();
        if replicas.is_empty() {
            return report;
        }

        let permits = Arc::new(Semaphore::new(
            self.options.max_parallel.clamp(1, replicas.len()),
        ));
        let names: Vec<String> = replicas.iter().map(|r| r.name().to_string()).collect();
        let mut tasks = JoinSet::new();

        for replica in replicas {
            let permits = Arc::clone(&permits);
            let engine = self.clone();
            tasks.spawn(async move {
                let _permit = permits.acquire().await;
                let name = replica.name().to_string();
                let limit = engine.options.unit_timeout;
                let outcome = match bounded(
                    &name,
                    limit,
                    sync_replica(&engine.source, &engine.remote_path, replica.as_ref()),
                )
                .await
                {
                    Ok(outcome) => outcome,
                    Err(e) => e.into(),
                };
                log_outcome(&name, &outcome);
                if outcome.is_mutation() {
                    reload_after_mutation(&name, limit, replica.reload()).await;
                }
                (name, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome)) => report.record(name, outcome),
                Err(e) => tracing::error!(error = %e, "Replica task aborted"),
            }
        }
        for name in names {
            if report.get(&name).is_none() {
                report.record(name, Outcome::Failed("task aborted".into()));
            }
        }

        tracing::info!(
            replicas = report.len(),
            updated = report.mutations(),
            failed = report.failures(),
            "Push run completed"
        );
        report
    }
}

/// Hash, compare, push for one replica. Steps never overlap; the caller
/// reloads after a write.
async fn sync_replica(source: &Path, remote_path: &str, replica: &dyn PushTarget) -> Result<Outcome> {
    let host = replica.name();
    let local = ContentHash::of_file(source).await?;
    tracing::debug!(host = %host, hash = %local, "Local file hash");

    let remote = replica.remote_hash(remote_path).await?;
    tracing::debug!(
        host = %host,
        hash = %remote.map_or_else(|| "<absent>".to_string(), |h| h.to_string()),
        "Remote file hash"
    );
    if remote == Some(local) {
        return Ok(Outcome::Unchanged);
    }

    tracing::info!(host = %host, path = %remote_path, "Hashes differ, pushing file");
    // Whatever is on disk now gets pushed, even if it changed since hashing.
    let data = tokio::fs::read(source).await?;
    replica.push(remote_path, &data).await?;

    Ok(if remote.is_none() {
        Outcome::Created
    } else {
        Outcome::Updated
    })
}

fn log_outcome(host: &str, outcome: &Outcome) {
    if outcome.is_failure() {
        tracing::warn!(host = %host, outcome = %outcome, "Replica failed");
    } else {
        tracing::info!(host = %host, outcome = %outcome, "Replica reconciled");
    }
}
