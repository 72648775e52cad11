//! File snapshots and the pure diff that turns two of them into a plan.

use std::collections::{BTreeSet, HashMap};

use crate::hash::ContentHash;

/// One file in a snapshot. `name` is unique within its [`FileSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// File name relative to the directory scope.
    pub name: String,
    /// Content fingerprint.
    pub hash: ContentHash,
    /// Size in bytes, when the producer knows it.
    pub size: Option<u64>,
}

impl FileEntry {
    /// Creates an entry with an unknown size.
    #[must_use]
    pub fn new(name: impl Into<String>, hash: ContentHash) -> Self {
        Self {
            name: name.into(),
            hash,
            size: None,
        }
    }

    /// Creates an entry by hashing `data`, recording its length.
    #[must_use]
    pub fn from_bytes(name: impl Into<String>, data: &[u8]) -> Self {
        Self {
            name: name.into(),
            hash: ContentHash::of(data),
            size: Some(data.len() as u64),
        }
    }
}

/// A fully materialized, unordered snapshot keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileSet {
    entries: HashMap<String, FileEntry>,
}

impl FileSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an entry, returning the previous entry with the same name.
    pub fn insert(&mut self, entry: FileEntry) -> Option<FileEntry> {
        self.entries.insert(entry.name.clone(), entry)
    }

    /// Removes and returns the entry named `name`.
    pub fn remove(&mut self, name: &str) -> Option<FileEntry> {
        self.entries.remove(name)
    }

    /// Looks up an entry by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FileEntry> {
        self.entries.get(name)
    }

    /// Returns `true` if an entry named `name` exists.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Iterates over entry names in no particular order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterates over entries in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &FileEntry> {
        self.entries.values()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<FileEntry> for FileSet {
    fn from_iter<I: IntoIterator<Item = FileEntry>>(iter: I) -> Self {
        let mut set = Self::new();
        for entry in iter {
            set.insert(entry);
        }
        set
    }
}

/// What to do with names that exist locally but not remotely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletePolicy {
    /// Delete local-only names (pull mode).
    Mirror,
    /// Leave local-only names alone (push mode).
    Keep,
}

/// The action sets derived from two snapshots.
///
/// The four sets are pairwise disjoint and together cover every name in
/// `local ∪ remote`, except that under [`DeletePolicy::Keep`] local-only
/// names land in `unchanged`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    /// Remote-only names.
    pub to_create: BTreeSet<String>,
    /// Names present on both sides with different content.
    pub to_update: BTreeSet<String>,
    /// Local-only names.
    pub to_delete: BTreeSet<String>,
    /// Names requiring no action.
    pub unchanged: BTreeSet<String>,
}

impl ReconciliationPlan {
    /// Returns `true` if applying the plan would mutate nothing.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.to_create.is_empty() && self.to_update.is_empty() && self.to_delete.is_empty()
    }

    /// Number of mutating actions.
    #[must_use]
    pub fn action_count(&self) -> usize {
        self.to_create.len() + self.to_update.len() + self.to_delete.len()
    }
}

/// Computes the plan that makes `local` match `remote`.
#[must_use]
pub fn diff(local: &FileSet, remote: &FileSet, policy: DeletePolicy) -> ReconciliationPlan {
    let mut plan = ReconciliationPlan::default();

    for entry in remote.iter() {
        match local.get(&entry.name) {
            None => {
                plan.to_create.insert(entry.name.clone());
            }
            Some(ours) if ours.hash != entry.hash => {
                plan.to_update.insert(entry.name.clone());
            }
            Some(_) => {
                plan.unchanged.insert(entry.name.clone());
            }
        }
    }

    for name in local.names().filter(|n| !remote.contains(n)) {
        match policy {
            DeletePolicy::Mirror => plan.to_delete.insert(name.to_string()),
            DeletePolicy::Keep => plan.unchanged.insert(name.to_string()),
        };
    }

    plan
}
