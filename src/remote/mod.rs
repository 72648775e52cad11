//! Remote ends of a sync: replicas we push to and sources we pull from.

pub mod repository;
pub mod ssh;

use async_trait::async_trait;

use crate::error::Result;
use crate::hash::ContentHash;

pub use repository::{RepositoryConfig, RepositorySource};
pub use ssh::{SshConfig, SshReplica};

/// A host that should hold a copy of the authoritative file.
#[async_trait]
pub trait PushTarget: Send + Sync {
    /// Name used in logs and reports (usually the host).
    fn name(&self) -> &str;

    /// Hash of the file at `path` on the target, or `None` if it is absent.
    async fn remote_hash(&self, path: &str) -> Result<Option<ContentHash>>;

    /// Overwrites the file at `path` with `data`.
    async fn push(&self, path: &str, data: &[u8]) -> Result<()>;

    /// Reloads the resolver running on the target.
    async fn reload(&self) -> Result<()>;
}

/// One file offered by a [`PullSource`] listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    /// File name, unique within the listing.
    pub name: String,
    /// Where to fetch the content from.
    pub locator: String,
    /// Size in bytes, if the listing reports it.
    pub size: Option<u64>,
}

/// A versioned remote folder we mirror locally.
///
/// Path, revision and suffix filter are fixed when the source is built.
#[async_trait]
pub trait PullSource: Send + Sync {
    /// Lists the files currently in the folder.
    async fn list(&self) -> Result<Vec<RemoteEntry>>;

    /// Fetches the content behind a locator from [`list`](Self::list).
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}
