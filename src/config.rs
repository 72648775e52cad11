//! Run configuration.
//!
//! Built once at startup and handed to the engines; nothing here reads the
//! environment. [`validate`](PushConfig::validate) runs before any work so a
//! bad setting never leaves a run half-done.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use crate::engine::{DEFAULT_MAX_PARALLEL, DEFAULT_UNIT_TIMEOUT, PullEngine, PushEngine, PushOptions};
use crate::error::{Result, SyncError};
use crate::remote::{PushTarget, RepositoryConfig, SshConfig, SshReplica};

/// Push mode: one local file, many SSH replicas.
///
/// # Example
///
/// ```
/// use resolver_sync::config::PushConfig;
/// use resolver_sync::remote::SshConfig;
///
/// let config = PushConfig::new(
///     "/etc/dnsmasq.d/02-custom.conf",
///     vec!["10.0.0.2".into(), "10.0.0.3".into()],
///     SshConfig::new("pi"),
/// )
/// .with_max_parallel(4);
///
/// assert_eq!(config.remote_path(), "/etc/dnsmasq.d/02-custom.conf");
/// assert_eq!(config.max_parallel, 4);
/// ```
#[derive(Debug, Clone)]
pub struct PushConfig {
    /// Authoritative file.
    pub source: PathBuf,
    /// Path on the replicas. Defaults to `source`.
    pub remote_path: Option<String>,
    /// Replica hosts.
    pub replicas: Vec<String>,
    /// SSH settings shared by all replicas.
    pub ssh: SshConfig,
    /// Replicas processed at once.
    pub max_parallel: usize,
    /// Limit on one replica's session.
    pub unit_timeout: Duration,
}

impl PushConfig {
    /// Creates a config with default concurrency and timeout.
    #[must_use]
    pub fn new(source: impl Into<PathBuf>, replicas: Vec<String>, ssh: SshConfig) -> Self {
        Self {
            source: source.into(),
            remote_path: None,
            replicas,
            ssh,
            max_parallel: DEFAULT_MAX_PARALLEL,
            unit_timeout: DEFAULT_UNIT_TIMEOUT,
        }
    }

    /// Writes to a different path on the replicas.
    #[must_use]
    pub fn with_remote_path(mut self, path: impl Into<String>) -> Self {
        self.remote_path = Some(path.into());
        self
    }

    /// Overrides the concurrency cap.
    #[must_use]
    pub const fn with_max_parallel(mut self, n: usize) -> Self {
        self.max_parallel = n;
        self
    }

    /// Overrides the per-replica timeout.
    #[must_use]
    pub const fn with_unit_timeout(mut self, limit: Duration) -> Self {
        self.unit_timeout = limit;
        self
    }

    /// Path written on each replica.
    #[must_use]
    pub fn remote_path(&self) -> String {
        self.remote_path
            .clone()
            .unwrap_or_else(|| self.source.display().to_string())
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        if !self.source.is_file() {
            return Err(invalid(format!(
                "authoritative file {} does not exist or is not a file",
                self.source.display()
            )));
        }
        if self.remote_path().trim().is_empty() {
            return Err(invalid("remote path is empty"));
        }
        if self.replicas.is_empty() {
            return Err(invalid("replica list is empty"));
        }
        let mut seen = HashSet::new();
        for host in &self.replicas {
            if host.trim().is_empty() {
                return Err(invalid("replica list contains an empty host"));
            }
            if !seen.insert(host.as_str()) {
                return Err(invalid(format!("replica {host} listed twice")));
            }
        }
        if self.ssh.user.trim().is_empty() {
            return Err(invalid("SSH user is empty"));
        }
        if let Some(identity) = &self.ssh.identity {
            if !identity.is_file() {
                return Err(invalid(format!(
                    "SSH identity {} does not exist",
                    identity.display()
                )));
            }
        }
        if self.ssh.reload_command.trim().is_empty() {
            return Err(invalid("reload command is empty"));
        }
        if self.max_parallel == 0 {
            return Err(invalid("max parallel must be at least 1"));
        }
        check_timeout(self.unit_timeout)
    }

    /// Builds the engine for this config.
    #[must_use]
    pub fn engine(&self) -> PushEngine {
        PushEngine::new(&self.source, self.remote_path()).with_options(PushOptions {
            max_parallel: self.max_parallel,
            unit_timeout: self.unit_timeout,
        })
    }

    /// Builds one [`SshReplica`] per host.
    #[must_use]
    pub fn replicas(&self) -> Vec<Arc<dyn PushTarget>> {
        let ssh = Arc::new(self.ssh.clone());
        self.replicas
            .iter()
            .map(|host| Arc::new(SshReplica::new(host.trim(), Arc::clone(&ssh))) as Arc<dyn PushTarget>)
            .collect()
    }
}

/// Pull mode: a repository folder mirrored into a local directory.
#[derive(Debug, Clone)]
pub struct PullConfig {
    /// Remote folder, revision and suffix filter.
    pub repository: RepositoryConfig,
    /// Local mirror directory.
    pub local_dir: PathBuf,
    /// Local reload command.
    pub reload_command: String,
    /// Limit on each fetch and each local mutation.
    pub unit_timeout: Duration,
}

impl PullConfig {
    /// Creates a config with the default reload command and timeout.
    #[must_use]
    pub fn new(repository: RepositoryConfig, local_dir: impl Into<PathBuf>) -> Self {
        Self {
            repository,
            local_dir: local_dir.into(),
            reload_command: crate::reload::DEFAULT_RELOAD_COMMAND.to_string(),
            unit_timeout: DEFAULT_UNIT_TIMEOUT,
        }
    }

    /// Overrides the reload command.
    #[must_use]
    pub fn with_reload_command(mut self, command: impl Into<String>) -> Self {
        self.reload_command = command.into();
        self
    }

    /// Overrides the per-file timeout.
    #[must_use]
    pub const fn with_unit_timeout(mut self, limit: Duration) -> Self {
        self.unit_timeout = limit;
        self
    }

    /// Checks every setting.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] naming the first bad setting.
    pub fn validate(&self) -> Result<()> {
        let repo = &self.repository;
        if repo.repo.trim().is_empty() {
            return Err(invalid("repository is empty"));
        }
        if repo.reference.trim().is_empty() {
            return Err(invalid("repository branch/ref is empty"));
        }
        // An empty suffix would mirror, and delete, everything in the directory.
        if repo.suffix.is_empty() {
            return Err(invalid("suffix filter is empty"));
        }
        if self.local_dir.as_os_str().is_empty() {
            return Err(invalid("local directory is empty"));
        }
        if self.local_dir.exists() && !self.local_dir.is_dir() {
            return Err(invalid(format!(
                "local directory {} is not a directory",
                self.local_dir.display()
            )));
        }
        if self.reload_command.trim().is_empty() {
            return Err(invalid("reload command is empty"));
        }
        check_timeout(self.unit_timeout)
    }

    /// Builds the engine for this config.
    #[must_use]
    pub fn engine(&self) -> PullEngine {
        PullEngine::new(&self.repository.suffix).with_unit_timeout(self.unit_timeout)
    }
}

fn check_timeout(limit: Duration) -> Result<()> {
    if limit.is_zero() {
        return Err(invalid("unit timeout must be positive"));
    }
    Ok(())
}

fn invalid(message: impl Into<String>) -> SyncError {
    SyncError::InvalidConfig(message.into())
}
