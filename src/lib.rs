//! # resolver-sync
//!
//! Keep DNS resolver configuration files (dnsmasq / Pi-hole `*.conf`,
//! `custom.list`, ...) identical across a fleet, reloading the resolver only
//! when content actually changed.
//!
//! Two directions are supported:
//!
//! - **push**: one authoritative local file is copied to every SSH replica
//!   whose SHA-256 differs, followed by one reload on that replica.
//! - **pull**: a folder in a hosted repository is mirrored into a local
//!   directory. Local-only files are deleted, and the local resolver reloads
//!   after each changed file.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use resolver_sync::config::PushConfig;
//! use resolver_sync::remote::SshConfig;
//!
//! let config = PushConfig::new(
//!     "/etc/dnsmasq.d/02-custom.conf",
//!     vec!["10.0.0.2".into(), "10.0.0.3".into()],
//!     SshConfig::new("pi").with_identity("/root/.ssh/id_ed25519"),
//! );
//! config.validate()?;
//!
//! let report = config.engine().run(config.replicas()).await;
//! for (host, outcome) in report.iter() {
//!     println!("{host}: {outcome}");
//! }
//! ```
//!
//! ## Failure model
//!
//! Every replica (push) or file (pull) is an independent unit. A unit that
//! fails or times out is reported as [`Outcome::Failed`] and the run carries
//! on. Only configuration errors and an unlistable pull source abort a run.
//!
//! ## Testing seams
//!
//! The engines only talk to [`PushTarget`](remote::PushTarget),
//! [`PullSource`](remote::PullSource), [`FileStore`] and [`ReloadTrigger`],
//! so tests can substitute in-memory fakes for SSH, HTTP and the reload
//! command.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod engine;
pub mod error;
pub mod hash;
pub mod logging;
pub mod plan;
pub mod reload;
pub mod remote;
pub mod store;

pub use engine::{Outcome, PullEngine, PushEngine, Report};
pub use error::{Result, SyncError};
pub use hash::ContentHash;
pub use plan::{DeletePolicy, FileEntry, FileSet, ReconciliationPlan, diff};
pub use reload::{CommandReload, ReloadTrigger};
pub use store::{FileStore, Listing, LocalStore};
