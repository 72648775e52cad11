//! Local directory access.
//!
//! [`FileStore`] is the seam the pull engine writes through; [`LocalStore`]
//! is the on-disk implementation scoped to one mirror directory.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::{Result, SyncError};
use crate::hash::ContentHash;
use crate::plan::{FileEntry, FileSet};

/// Read/write access to the files of one local directory.
///
/// Names are plain file names relative to the store's directory.
#[async_trait]
pub trait FileStore: Send + Sync {
    /// Reads a file's full content.
    async fn read(&self, name: &str) -> Result<Vec<u8>>;

    /// Replaces a file's content, creating it if absent.
    async fn write(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Removes a file.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Snapshots every regular file whose name ends with `suffix`.
    ///
    /// Only a failure to read the directory itself is an error; entries that
    /// cannot be hashed are returned in [`Listing::unreadable`].
    async fn list(&self, suffix: &str) -> Result<Listing>;
}

/// A directory snapshot plus the matching entries that could not be read.
#[derive(Debug, Default)]
pub struct Listing {
    pub files: FileSet,
    /// Names that matched the filter but could not be hashed, with the cause.
    pub unreadable: Vec<(String, SyncError)>,
}


/// A [`FileStore`] over a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    /// Creates a store rooted at `dir`. The directory need not exist yet.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Returns the store's directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> Result<PathBuf> {
        if !is_plain_name(name) {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing non-plain file name {name:?}"),
            )
            .into());
        }
        Ok(self.dir.join(name))
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path(name)?).await?)
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        let path = self.path(name)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(&path, data).await?;
        tracing::debug!(path = %path.display(), bytes = data.len(), "Wrote file");
        Ok(())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let path = self.path(name)?;
        tokio::fs::remove_file(&path).await?;
        tracing::debug!(path = %path.display(), "Removed file");
        Ok(())
    }

    /// Returns an empty set if the directory does not exist. Symlinks are
    /// followed, so a link to a regular file is listed under the link's name.
    async fn list(&self, suffix: &str) -> Result<Listing> {
        let mut listing = Listing::default();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(listing),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !name.ends_with(suffix) {
                continue;
            }
            let path = entry.path();
            match snapshot(&path).await {
                Ok(Some((hash, size))) => {
                    listing.files.insert(FileEntry {
                        hash,
                        size: Some(size),
                        name,
                    });
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Cannot read local file");
                    listing.unreadable.push((name, e));
                }
            }
        }
        Ok(listing)
    }
}

/// Hash and size of a regular file (following symlinks), `None` for anything else.
async fn snapshot(path: &Path) -> Result<Option<(ContentHash, u64)>> {
    let meta = tokio::fs::metadata(path).await?;
    if !meta.is_file() {
        return Ok(None);
    }
    Ok(Some((ContentHash::of_file(path).await?, meta.len())))
}

/// A single path component with no separators or parent references.
pub(crate) fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\', '\0'])
}
