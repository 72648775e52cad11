//! Resolver reload capability.

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Result, SyncError};

/// Default reload command for Pi-hole's dnsmasq.
pub const DEFAULT_RELOAD_COMMAND: &str = "pihole reloaddns";

/// Makes the running resolver pick up on-disk changes.
///
/// Engines call this only after a confirmed mutation. Implementations must
/// tolerate repeated calls within one run.
#[async_trait]
pub trait ReloadTrigger: Send + Sync {
    /// Performs the reload.
    async fn reload(&self) -> Result<()>;
}

/// Runs a reload command on the local host.
///
/// The command line is split on whitespace; no shell is involved.
#[derive(Debug, Clone)]
pub struct CommandReload {
    program: String,
    args: Vec<String>,
}

impl CommandReload {
    /// Parses `command` into program and arguments.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if `command` is blank.
    pub fn new(command: &str) -> Result<Self> {
        let mut words = command.split_whitespace().map(str::to_string);
        let program = words
            .next()
            .ok_or_else(|| SyncError::InvalidConfig("reload command is empty".into()))?;
        Ok(Self {
            program,
            args: words.collect(),
        })
    }
}

#[async_trait]
impl ReloadTrigger for CommandReload {
    async fn reload(&self) -> Result<()> {
        tracing::info!(command = %self.program, "Reloading DNS");
        let output = Command::new(&self.program)
            .args(&self.args)
            .output()
            .await
            .map_err(|e| SyncError::Reload(format!("cannot run {}: {e}", self.program)))?;

        if !output.status.success() {
            return Err(SyncError::Reload(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        tracing::info!("DNS reloaded");
        Ok(())
    }
}
