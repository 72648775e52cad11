//! In-memory fakes for the engine seams.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use resolver_sync::remote::{PullSource, PushTarget, RemoteEntry};
use resolver_sync::{ContentHash, ReloadTrigger, Result, SyncError};

/// A replica holding files in memory.
pub struct FakeReplica {
    name: String,
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub pushes: AtomicUsize,
    pub reloads: AtomicUsize,
    unreachable: bool,
    reload_fails: bool,
    delay: Duration,
    reload_delay: Duration,
    in_flight: Option<&'static InFlight>,
}

impl FakeReplica {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            files: Mutex::new(HashMap::new()),
            pushes: AtomicUsize::new(0),
            reloads: AtomicUsize::new(0),
            unreachable: false,
            reload_fails: false,
            delay: Duration::ZERO,
            reload_delay: Duration::ZERO,
            in_flight: None,
        }
    }

    pub fn with_file(self, path: &str, data: &[u8]) -> Self {
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn failing_reload(mut self) -> Self {
        self.reload_fails = true;
        self
    }

    /// Every hash query takes `delay`.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Every reload takes `delay`.
    pub fn slow_reload(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    pub fn tracked(mut self, in_flight: &'static InFlight) -> Self {
        self.in_flight = Some(in_flight);
        self
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }

    pub fn reload_count(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PushTarget for FakeReplica {
    fn name(&self) -> &str {
        &self.name
    }

    async fn remote_hash(&self, path: &str) -> Result<Option<ContentHash>> {
        if self.unreachable {
            return Err(SyncError::Connect {
                target: self.name.clone(),
                message: "No route to host".into(),
            });
        }
        if let Some(counter) = self.in_flight {
            counter.enter();
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if let Some(counter) = self.in_flight {
            counter.leave();
        }
        Ok(self.file(path).map(|data| ContentHash::of(&data)))
    }

    async fn push(&self, path: &str, data: &[u8]) -> Result<()> {
        self.pushes.fetch_add(1, Ordering::SeqCst);
        self.files
            .lock()
            .unwrap()
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if !self.reload_delay.is_zero() {
            tokio::time::sleep(self.reload_delay).await;
        }
        if self.reload_fails {
            return Err(SyncError::Reload("pihole: command not found".into()));
        }
        Ok(())
    }
}

/// Tracks the peak number of concurrent callers.
#[derive(Default)]
pub struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl InFlight {
    pub const fn new() -> Self {
        Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// A remote folder held in memory. Locators are `mem://<name>`.
#[derive(Default)]
pub struct FakeSource {
    pub files: Mutex<HashMap<String, Vec<u8>>>,
    pub broken: HashSet<String>,
    pub listing_fails: bool,
    pub fetches: AtomicUsize,
}

impl FakeSource {
    pub fn new(files: &[(&str, &str)]) -> Self {
        Self {
            files: Mutex::new(
                files
                    .iter()
                    .map(|(n, b)| ((*n).to_string(), b.as_bytes().to_vec()))
                    .collect(),
            ),
            ..Self::default()
        }
    }

    /// Fetching `name` fails.
    pub fn with_broken(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.listing_fails = true;
        self
    }
}

#[async_trait]
impl PullSource for FakeSource {
    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        if self.listing_fails {
            return Err(SyncError::Connect {
                target: "api.example.com".into(),
                message: "connection refused".into(),
            });
        }
        Ok(self
            .files
            .lock()
            .unwrap()
            .iter()
            .map(|(name, data)| RemoteEntry {
                name: name.clone(),
                locator: format!("mem://{name}"),
                size: Some(data.len() as u64),
            })
            .collect())
    }

    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let name = locator.trim_start_matches("mem://");
        if self.broken.contains(name) {
            return Err(SyncError::Remote {
                target: locator.to_string(),
                message: "HTTP 502 Bad Gateway".into(),
            });
        }
        self.files
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .ok_or_else(|| SyncError::Remote {
                target: locator.to_string(),
                message: "HTTP 404 Not Found".into(),
            })
    }
}

/// Counts reloads; optionally fails or stalls every one of them.
#[derive(Default)]
pub struct CountingReload {
    pub calls: AtomicUsize,
    pub fails: bool,
    pub delay: Duration,
}

impl CountingReload {
    pub fn count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReloadTrigger for CountingReload {
    async fn reload(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fails {
            return Err(SyncError::Reload("exit status 1".into()));
        }
        Ok(())
    }
}
