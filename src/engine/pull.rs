//! A remote folder mirrored into a local directory.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;

use super::{DEFAULT_UNIT_TIMEOUT, Outcome, Report, bounded, reload_after_mutation};
use crate::error::Result;
use crate::plan::{DeletePolicy, FileEntry, FileSet, diff};
use crate::reload::ReloadTrigger;
use crate::remote::PullSource;
use crate::store::FileStore;

/// Converges a local directory onto a [`PullSource`].
///
/// Local-only files are deleted, remote-only files created and differing
/// files replaced. The reload fires once after every individual change.
#[derive(Debug, Clone)]
pub struct PullEngine {
    suffix: String,
    unit_timeout: Duration,
}

impl PullEngine {
    /// Mirrors files whose names end with `suffix`.
    #[must_use]
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            unit_timeout: DEFAULT_UNIT_TIMEOUT,
        }
    }

    /// Overrides the per-file timeout.
    #[must_use]
    pub const fn with_unit_timeout(mut self, limit: Duration) -> Self {
        self.unit_timeout = limit;
        self
    }

    /// Runs one reconciliation pass.
    ///
    /// A file whose remote content cannot be fetched, or whose local copy
    /// cannot be read, is reported as failed and left untouched locally; the
    /// other files proceed.
    ///
    /// # Errors
    ///
    /// Fails the whole run only if the remote folder or the local directory
    /// itself cannot be listed.
    pub async fn run(
        &self,
        source: &dyn PullSource,
        store: &dyn FileStore,
        reload: &dyn ReloadTrigger,
    ) -> Result<Report> {
        let listing = bounded("remote listing", self.unit_timeout, source.list()).await?;
        let local_listing = store.list(&self.suffix).await?;
        let mut local = local_listing.files;
        let mut report = Report::default();

        let mut remote = FileSet::new();
        let mut contents: HashMap<String, Vec<u8>> = HashMap::new();
        for entry in listing {
            if remote.contains(&entry.name) {
                tracing::warn!(file = %entry.name, "Duplicate name in remote listing, keeping the first");
                continue;
            }
            match bounded(&entry.name, self.unit_timeout, source.fetch(&entry.locator)).await {
                Ok(data) => {
                    remote.insert(FileEntry::from_bytes(entry.name.clone(), &data));
                    contents.insert(entry.name, data);
                }
                Err(e) => {
                    tracing::warn!(file = %entry.name, error = %e, "Cannot fetch remote file");
                    // Unknown remote content: neither delete nor rewrite the local copy.
                    local.remove(&entry.name);
                    report.record(entry.name, e.into());
                }
            }
        }

        // Unknown local content: same treatment as an unfetchable remote file.
        for (name, e) in local_listing.unreadable {
            remote.remove(&name);
            contents.remove(&name);
            report.record(name, e.into());
        }

        let plan = diff(&local, &remote, DeletePolicy::Mirror);
        tracing::info!(
            create = plan.to_create.len(),
            update = plan.to_update.len(),
            delete = plan.to_delete.len(),
            unchanged = plan.unchanged.len(),
            "Reconciliation plan"
        );

        for name in &plan.to_delete {
            let outcome = self
                .apply(name, Outcome::Deleted, store.remove(name), reload)
                .await;
            report.record(name.clone(), outcome);
        }

        let writes = plan
            .to_create
            .iter()
            .map(|n| (n, Outcome::Created))
            .chain(plan.to_update.iter().map(|n| (n, Outcome::Updated)));
        for (name, intended) in writes {
            let outcome = match contents.get(name) {
                Some(data) => self.apply(name, intended, store.write(name, data), reload).await,
                None => Outcome::Failed(format!("no fetched content for {name}")),
            };
            report.record(name.clone(), outcome);
        }

        for name in plan.unchanged {
            tracing::info!(file = %name, outcome = %Outcome::Unchanged, "File reconciled");
            report.record(name, Outcome::Unchanged);
        }

        tracing::info!(
            files = report.len(),
            changed = report.mutations(),
            failed = report.failures(),
            "Pull run completed"
        );
        Ok(report)
    }

    /// Applies one mutation, then reloads if it succeeded.
    async fn apply(
        &self,
        name: &str,
        intended: Outcome,
        mutation: impl Future<Output = Result<()>>,
        reload: &dyn ReloadTrigger,
    ) -> Outcome {
        match bounded(name, self.unit_timeout, mutation).await {
            Ok(()) => {
                tracing::info!(file = %name, outcome = %intended, "File reconciled");
                reload_after_mutation(name, self.unit_timeout, reload.reload()).await;
                intended
            }
            Err(e) => {
                let outcome = Outcome::from(e);
                tracing::warn!(file = %name, outcome = %outcome, "File failed");
                outcome
            }
        }
    }
}
