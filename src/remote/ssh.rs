//! SSH replicas driven through the system `ssh` binary.
//!
//! Using the system client keeps the user's `~/.ssh/config`, known hosts and
//! agent in play. With no identity file configured, authentication falls back
//! to whatever the agent offers.

use std::path::PathBuf;
use std::process::{Output, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::PushTarget;
use crate::error::{Result, SyncError};
use crate::hash::ContentHash;
use crate::reload::DEFAULT_RELOAD_COMMAND;

/// `ssh` exits with 255 when the connection itself failed.
const SSH_CONNECT_FAILURE: i32 = 255;

/// Connection settings shared by every replica in a run.
#[derive(Debug, Clone)]
pub struct SshConfig {
    /// Remote login user.
    pub user: String,
    /// SSH port.
    pub port: u16,
    /// Private key file. `None` uses the SSH agent.
    pub identity: Option<PathBuf>,
    /// Seconds `ssh` waits for the TCP connection.
    pub connect_timeout_secs: u32,
    /// Command run on the replica after a push.
    pub reload_command: String,
}

impl SshConfig {
    /// Creates settings for `user` on port 22, agent authentication.
    #[must_use]
    pub fn new(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            port: 22,
            identity: None,
            connect_timeout_secs: 10,
            reload_command: DEFAULT_RELOAD_COMMAND.to_string(),
        }
    }

    /// Overrides the port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Authenticates with a key file instead of the agent.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    /// Overrides the remote reload command.
    #[must_use]
    pub fn with_reload_command(mut self, command: impl Into<String>) -> Self {
        self.reload_command = command.into();
        self
    }
}

/// One replica host reachable over SSH.
#[derive(Debug, Clone)]
pub struct SshReplica {
    host: String,
    config: Arc<SshConfig>,
}

impl SshReplica {
    /// Creates a replica for `host` sharing `config`.
    #[must_use]
    pub fn new(host: impl Into<String>, config: Arc<SshConfig>) -> Self {
        Self {
            host: host.into(),
            config,
        }
    }

    fn ssh_args(&self, remote_command: &str) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.config.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.config.connect_timeout_secs),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
        ];
        if let Some(identity) = &self.config.identity {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", self.config.user, self.host));
        args.push(remote_command.to_string());
        args
    }

    /// Runs `remote_command` on the replica, optionally feeding `stdin`.
    async fn execute(&self, remote_command: &str, stdin: Option<&[u8]>) -> Result<Output> {
        tracing::debug!(host = %self.host, command = %remote_command, "Running remote command");
        let mut child = Command::new("ssh")
            .args(self.ssh_args(remote_command))
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.connect_error(format!("cannot spawn ssh: {e}")))?;

        let mut written = Ok(());
        if let (Some(data), Some(mut pipe)) = (stdin, child.stdin.take()) {
            written = async {
                pipe.write_all(data).await?;
                pipe.shutdown().await
            }
            .await;
        }

        // A failed connection closes stdin early; report that, not the broken pipe.
        let output = child.wait_with_output().await?;
        if output.status.code() == Some(SSH_CONNECT_FAILURE) {
            return Err(self.connect_error(stderr_of(&output)));
        }
        written?;
        Ok(output)
    }

    fn connect_error(&self, message: String) -> SyncError {
        SyncError::Connect {
            target: self.host.clone(),
            message,
        }
    }
}

#[async_trait]
impl PushTarget for SshReplica {
    fn name(&self) -> &str {
        &self.host
    }

    async fn remote_hash(&self, path: &str) -> Result<Option<ContentHash>> {
        let output = self
            .execute(&format!("sha256sum -- {}", shell_quote(path)), None)
            .await?;
        if output.status.success() {
            let stdout = String::from_utf8_lossy(&output.stdout);
            return ContentHash::from_sha256sum_output(&stdout).map(Some);
        }
        let stderr = stderr_of(&output);
        if stderr.contains("No such file") {
            return Ok(None);
        }
        Err(SyncError::remote(&self.host, format!("sha256sum failed: {stderr}")))
    }

    async fn push(&self, path: &str, data: &[u8]) -> Result<()> {
        let output = self
            .execute(&format!("cat > {}", shell_quote(path)), Some(data))
            .await?;
        if !output.status.success() {
            return Err(SyncError::remote(
                &self.host,
                format!("write to {path} failed: {}", stderr_of(&output)),
            ));
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        let output = self.execute(&self.config.reload_command, None).await?;
        if !output.status.success() {
            return Err(SyncError::Reload(format!(
                "{} on {}: {}",
                self.config.reload_command,
                self.host,
                stderr_of(&output)
            )));
        }
        Ok(())
    }
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).trim().to_string()
}

/// Single-quotes `s` for a POSIX shell.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}
