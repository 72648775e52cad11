//! SHA-256 content fingerprints.
//!
//! Every comparison in the crate goes through [`ContentHash`], whether the
//! bytes came from a local file, `sha256sum` on a replica, or an HTTP body.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::io::AsyncReadExt;

use crate::error::{Result, SyncError};

const READ_BUF: usize = 64 * 1024;

/// A 256-bit SHA-256 digest, displayed as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hashes an in-memory payload.
    #[must_use]
    pub fn of(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }

    /// Hashes a file by streaming it.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Io`] if the file cannot be opened or read.
    pub async fn of_file(path: &Path) -> Result<Self> {
        let mut file = tokio::fs::File::open(path).await?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; READ_BUF];
        loop {
            let n = file.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(Self(hasher.finalize().into()))
    }

    /// Parses a 64-character hex digest. Case-insensitive.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidHash`] for anything else.
    pub fn from_hex(s: &str) -> Result<Self> {
        let mut out = [0u8; 32];
        hex::decode_to_slice(s, &mut out).map_err(|_| SyncError::InvalidHash(s.to_string()))?;
        Ok(Self(out))
    }

    /// Parses `sha256sum` output (`<digest>  <path>`), taking the first token.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidHash`] if the output is empty or the first
    /// token is not a digest.
    pub fn from_sha256sum_output(output: &str) -> Result<Self> {
        let token = output
            .split_whitespace()
            .next()
            .ok_or_else(|| SyncError::InvalidHash(output.to_string()))?;
        // sha256sum prefixes the digest with '\' when the path needs escaping.
        Self::from_hex(token.trim_start_matches('\\'))
    }

    /// Returns the digest as lowercase hex.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let hex = self.to_hex();
        write!(f, "ContentHash({})", &hex[..16])
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}
