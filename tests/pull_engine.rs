//! Pull-mode reconciliation into a temporary directory.

mod common;

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use common::{CountingReload, FakeSource};
use resolver_sync::{FileStore, Listing, LocalStore, Outcome, PullEngine, Result, SyncError};

fn seed(dir: &tempfile::TempDir, files: &[(&str, &str)]) {
    for (name, body) in files {
        std::fs::write(dir.path().join(name), body).unwrap();
    }
}

fn read(dir: &tempfile::TempDir, name: &str) -> Option<String> {
    std::fs::read_to_string(dir.path().join(name)).ok()
}

#[tokio::test]
async fn create_update_delete_with_reload_per_file() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("y.conf", "old y\n"), ("z.conf", "z\n")]);
    let source = FakeSource::new(&[("x.conf", "x\n"), ("y.conf", "new y\n")]);
    let reload = CountingReload::default();

    let report = PullEngine::new(".conf")
        .run(&source, &LocalStore::new(dir.path()), &reload)
        .await
        .unwrap();

    assert_eq!(report.get("x.conf"), Some(&Outcome::Created));
    assert_eq!(report.get("y.conf"), Some(&Outcome::Updated));
    assert_eq!(report.get("z.conf"), Some(&Outcome::Deleted));
    assert_eq!(reload.count(), 3);

    assert_eq!(read(&dir, "x.conf").as_deref(), Some("x\n"));
    assert_eq!(read(&dir, "y.conf").as_deref(), Some("new y\n"));
    assert_eq!(read(&dir, "z.conf"), None);
}

#[tokio::test]
async fn second_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("stale.conf", "s")]);
    let source = FakeSource::new(&[("a.conf", "a"), ("b.conf", "b")]);
    let store = LocalStore::new(dir.path());
    let engine = PullEngine::new(".conf");

    let first_reload = CountingReload::default();
    let first = engine.run(&source, &store, &first_reload).await.unwrap();
    assert_eq!(first.mutations(), 3);

    let second_reload = CountingReload::default();
    let second = engine.run(&source, &store, &second_reload).await.unwrap();
    assert_eq!(second.mutations(), 0);
    assert_eq!(second_reload.count(), 0);
    assert!(second.iter().all(|(_, o)| *o == Outcome::Unchanged));
}

#[tokio::test]
async fn unchanged_files_do_not_reload() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("a.conf", "same")]);
    let source = FakeSource::new(&[("a.conf", "same")]);
    let reload = CountingReload::default();

    let report = PullEngine::new(".conf")
        .run(&source, &LocalStore::new(dir.path()), &reload)
        .await
        .unwrap();

    assert_eq!(report.get("a.conf"), Some(&Outcome::Unchanged));
    assert_eq!(reload.count(), 0);
}

#[tokio::test]
async fn fetch_failure_leaves_local_copy_alone() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("keep.conf", "local"), ("gone.conf", "g")]);
    let source = FakeSource::new(&[
        ("keep.conf", "remote"),
        ("new.conf", "n"),
        ("fine.conf", "f"),
    ])
    .with_broken("keep.conf")
    .with_broken("new.conf");
    let reload = CountingReload::default();

    let report = PullEngine::new(".conf")
        .run(&source, &LocalStore::new(dir.path()), &reload)
        .await
        .unwrap();

    assert!(matches!(report.get("keep.conf"), Some(Outcome::Failed(r)) if r.contains("502")));
    assert!(matches!(report.get("new.conf"), Some(Outcome::Failed(_))));
    assert_eq!(report.get("fine.conf"), Some(&Outcome::Created));
    assert_eq!(report.get("gone.conf"), Some(&Outcome::Deleted));

    assert_eq!(read(&dir, "keep.conf").as_deref(), Some("local"));
    assert_eq!(read(&dir, "new.conf"), None);
    assert_eq!(reload.count(), 2);
}

#[tokio::test]
async fn listing_failure_aborts_without_touching_anything() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("a.conf", "a")]);
    let source = FakeSource::new(&[]).failing_listing();
    let reload = CountingReload::default();

    let result = PullEngine::new(".conf")
        .run(&source, &LocalStore::new(dir.path()), &reload)
        .await;

    assert!(result.is_err());
    assert_eq!(read(&dir, "a.conf").as_deref(), Some("a"));
    assert_eq!(reload.count(), 0);
}

#[tokio::test]
async fn files_outside_suffix_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("custom.list", "local list"), ("a.conf", "a")]);
    let source = FakeSource::new(&[("a.conf", "a")]);
    let reload = CountingReload::default();

    let report = PullEngine::new(".conf")
        .run(&source, &LocalStore::new(dir.path()), &reload)
        .await
        .unwrap();

    assert!(report.get("custom.list").is_none());
    assert_eq!(read(&dir, "custom.list").as_deref(), Some("local list"));
}

#[tokio::test]
async fn reload_failure_keeps_the_change() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource::new(&[("a.conf", "a")]);
    let reload = CountingReload {
        fails: true,
        ..CountingReload::default()
    };

    let report = PullEngine::new(".conf")
        .run(&source, &LocalStore::new(dir.path()), &reload)
        .await
        .unwrap();

    assert_eq!(report.get("a.conf"), Some(&Outcome::Created));
    assert_eq!(read(&dir, "a.conf").as_deref(), Some("a"));
    assert_eq!(reload.count(), 1);
}

#[tokio::test]
async fn hanging_reload_is_cut_off_and_keeps_the_change() {
    let dir = tempfile::tempdir().unwrap();
    let source = FakeSource::new(&[("a.conf", "a"), ("b.conf", "b")]);
    let reload = CountingReload {
        delay: Duration::from_secs(30),
        ..CountingReload::default()
    };
    let engine = PullEngine::new(".conf").with_unit_timeout(Duration::from_millis(200));

    let report = tokio::time::timeout(
        Duration::from_secs(10),
        engine.run(&source, &LocalStore::new(dir.path()), &reload),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(report.get("a.conf"), Some(&Outcome::Created));
    assert_eq!(report.get("b.conf"), Some(&Outcome::Created));
    assert_eq!(read(&dir, "b.conf").as_deref(), Some("b"));
    assert_eq!(reload.count(), 2);
}

#[cfg(unix)]
#[tokio::test]
async fn symlinked_files_are_mirrored_like_regular_files() {
    let dir = tempfile::tempdir().unwrap();
    let shared = tempfile::tempdir().unwrap();
    std::fs::write(shared.path().join("a.txt"), "same").unwrap();
    std::fs::write(shared.path().join("orphan.txt"), "o").unwrap();
    std::os::unix::fs::symlink(shared.path().join("a.txt"), dir.path().join("a.conf")).unwrap();
    std::os::unix::fs::symlink(shared.path().join("orphan.txt"), dir.path().join("orphan.conf"))
        .unwrap();
    let source = FakeSource::new(&[("a.conf", "same")]);
    let store = LocalStore::new(dir.path());
    let engine = PullEngine::new(".conf");

    let reload = CountingReload::default();
    let first = engine.run(&source, &store, &reload).await.unwrap();
    assert_eq!(first.get("a.conf"), Some(&Outcome::Unchanged));
    assert_eq!(first.get("orphan.conf"), Some(&Outcome::Deleted));
    assert_eq!(reload.count(), 1);
    assert!(dir.path().join("orphan.conf").symlink_metadata().is_err());
    assert_eq!(
        std::fs::read_to_string(shared.path().join("orphan.txt")).unwrap(),
        "o"
    );

    let reload = CountingReload::default();
    let second = engine.run(&source, &store, &reload).await.unwrap();
    assert_eq!(second.mutations(), 0);
    assert_eq!(reload.count(), 0);
}

/// A local store where one file exists but cannot be read.
struct LockedFileStore {
    inner: RecordingStore,
    locked: &'static str,
}

#[async_trait]
impl FileStore for LockedFileStore {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.inner.read(name).await
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.inner.write(name, data).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.inner.remove(name).await
    }

    async fn list(&self, suffix: &str) -> Result<Listing> {
        let mut listing = self.inner.list(suffix).await?;
        listing.files.remove(self.locked);
        listing.unreadable.push((
            self.locked.to_string(),
            SyncError::from(std::io::Error::from(std::io::ErrorKind::PermissionDenied)),
        ));
        Ok(listing)
    }
}

#[tokio::test]
async fn unreadable_local_file_fails_alone() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("locked.conf", "local"), ("stale.conf", "s")]);
    let source = FakeSource::new(&[("locked.conf", "remote"), ("fine.conf", "f")]);
    let store = LockedFileStore {
        inner: RecordingStore {
            inner: LocalStore::new(dir.path()),
            ops: Mutex::new(Vec::new()),
        },
        locked: "locked.conf",
    };
    let reload = CountingReload::default();

    let report = PullEngine::new(".conf")
        .run(&source, &store, &reload)
        .await
        .unwrap();

    assert!(matches!(report.get("locked.conf"), Some(Outcome::Failed(_))));
    assert_eq!(report.get("fine.conf"), Some(&Outcome::Created));
    assert_eq!(report.get("stale.conf"), Some(&Outcome::Deleted));
    assert_eq!(read(&dir, "locked.conf").as_deref(), Some("local"));
    assert_eq!(reload.count(), 2);
    let ops = store.inner.ops.lock().unwrap().clone();
    assert!(!ops.iter().any(|op| op.ends_with("locked.conf")), "{ops:?}");
}

#[tokio::test]
async fn empty_remote_mirrors_to_empty() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("a.conf", "a"), ("b.conf", "b")]);
    let reload = CountingReload::default();

    let report = PullEngine::new(".conf")
        .run(&FakeSource::new(&[]), &LocalStore::new(dir.path()), &reload)
        .await
        .unwrap();

    assert_eq!(report.mutations(), 2);
    assert_eq!(reload.count(), 2);
    assert_eq!(read(&dir, "a.conf"), None);
}

/// Wraps a store and records the order of mutating calls.
struct RecordingStore {
    inner: LocalStore,
    ops: Mutex<Vec<String>>,
}

#[async_trait]
impl FileStore for RecordingStore {
    async fn read(&self, name: &str) -> Result<Vec<u8>> {
        self.inner.read(name).await
    }

    async fn write(&self, name: &str, data: &[u8]) -> Result<()> {
        self.ops.lock().unwrap().push(format!("write {name}"));
        self.inner.write(name, data).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.ops.lock().unwrap().push(format!("remove {name}"));
        self.inner.remove(name).await
    }

    async fn list(&self, suffix: &str) -> Result<Listing> {
        self.inner.list(suffix).await
    }
}

#[tokio::test]
async fn deletions_happen_before_writes() {
    let dir = tempfile::tempdir().unwrap();
    seed(&dir, &[("old1.conf", "1"), ("old2.conf", "2"), ("b.conf", "stale")]);
    let source = FakeSource::new(&[("a.conf", "a"), ("b.conf", "fresh")]);
    let store = RecordingStore {
        inner: LocalStore::new(dir.path()),
        ops: Mutex::new(Vec::new()),
    };

    PullEngine::new(".conf")
        .run(&source, &store, &CountingReload::default())
        .await
        .unwrap();

    let ops = store.ops.lock().unwrap().clone();
    assert_eq!(ops.len(), 4);
    assert!(ops[..2].iter().all(|op| op.starts_with("remove")), "{ops:?}");
    assert!(ops[2..].iter().all(|op| op.starts_with("write")), "{ops:?}");
}
