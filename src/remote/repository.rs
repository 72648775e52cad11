//! Pulling files from a hosted repository's contents API.
//!
//! Speaks the GitHub-style `GET /repos/{owner}/{repo}/contents/{path}?ref=`
//! endpoint, which lists a folder as a JSON array of entries carrying a
//! `download_url` for each file.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Url};
use serde::Deserialize;

use super::{PullSource, RemoteEntry};
use crate::error::{Result, SyncError};
use crate::store::is_plain_name;

/// Default API endpoint.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Where and what to pull.
#[derive(Debug, Clone)]
pub struct RepositoryConfig {
    /// `owner/name`.
    pub repo: String,
    /// Folder inside the repository. Empty means the root.
    pub path: String,
    /// Branch, tag or commit.
    pub reference: String,
    /// Only file names ending with this are considered.
    pub suffix: String,
    /// API base URL.
    pub api_base: String,
    /// Bearer token for private repositories.
    pub token: Option<String>,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl RepositoryConfig {
    /// Creates a config for `repo` at `reference`, repository root, any suffix.
    #[must_use]
    pub fn new(repo: impl Into<String>, reference: impl Into<String>) -> Self {
        Self {
            repo: repo.into(),
            path: String::new(),
            reference: reference.into(),
            suffix: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Restricts the listing to a folder.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Restricts the listing to names ending with `suffix`.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Points at a different API host (GitHub Enterprise, test servers).
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Authenticates requests with a bearer token.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

/// A [`PullSource`] backed by the repository contents API.
#[derive(Debug, Clone)]
pub struct RepositorySource {
    client: Client,
    listing_url: Url,
    config: RepositoryConfig,
}

impl RepositorySource {
    /// Builds the HTTP client and listing URL.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] for a malformed API base, a repo
    /// not in `owner/name` form, or an unusable token, and
    /// [`SyncError::Http`] if the client cannot be built.
    pub fn new(config: RepositoryConfig) -> Result<Self> {
        let listing_url = listing_url(&config)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| SyncError::InvalidConfig("token contains invalid characters".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = Client::builder()
            .user_agent(concat!("resolver-sync/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            listing_url,
            config,
        })
    }

    /// The URL [`list`](PullSource::list) requests.
    #[must_use]
    pub const fn listing_url(&self) -> &Url {
        &self.listing_url
    }

    async fn get(&self, url: Url) -> Result<reqwest::Response> {
        let target = url.to_string();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::Connect {
                target: target.clone(),
                message: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::remote(target, format!("HTTP {status}")));
        }
        Ok(response)
    }
}

#[async_trait]
impl PullSource for RepositorySource {
    async fn list(&self) -> Result<Vec<RemoteEntry>> {
        let mut url = self.listing_url.clone();
        url.query_pairs_mut()
            .append_pair("ref", &self.config.reference);

        let items: Vec<ContentsItem> = self.get(url).await?.json().await?;
        let entries = select_entries(items, &self.config.suffix);
        tracing::debug!(
            repo = %self.config.repo,
            reference = %self.config.reference,
            count = entries.len(),
            "Listed remote folder"
        );
        Ok(entries)
    }

    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        let url = Url::parse(locator)
            .map_err(|e| SyncError::remote(locator, format!("bad download URL: {e}")))?;
        Ok(self.get(url).await?.bytes().await?.to_vec())
    }
}

/// One element of a contents listing.
#[derive(Debug, Deserialize)]
struct ContentsItem {
    name: String,
    #[serde(rename = "type")]
    kind: String,
    size: Option<u64>,
    download_url: Option<String>,
}

fn listing_url(config: &RepositoryConfig) -> Result<Url> {
    let mut repo = config.repo.split('/');
    let (Some(owner), Some(name), None) = (repo.next(), repo.next(), repo.next()) else {
        return Err(SyncError::InvalidConfig(format!(
            "repository must be owner/name, got {:?}",
            config.repo
        )));
    };
    if owner.is_empty() || name.is_empty() {
        return Err(SyncError::InvalidConfig(format!(
            "repository must be owner/name, got {:?}",
            config.repo
        )));
    }

    let mut url = Url::parse(&config.api_base)
        .map_err(|e| SyncError::InvalidConfig(format!("api base {:?}: {e}", config.api_base)))?;
    url.path_segments_mut()
        .map_err(|()| SyncError::InvalidConfig(format!("api base {:?}", config.api_base)))?
        .pop_if_empty()
        .extend(["repos", owner, name, "contents"])
        .extend(config.path.split('/').filter(|s| !s.is_empty()));
    Ok(url)
}

fn select_entries(items: Vec<ContentsItem>, suffix: &str) -> Vec<RemoteEntry> {
    items
        .into_iter()
        .filter(|item| item.kind == "file" && item.name.ends_with(suffix))
        .filter_map(|item| {
            if !is_plain_name(&item.name) {
                tracing::warn!(file = %item.name, "Skipping remote entry with unsafe name");
                return None;
            }
            Some(RemoteEntry {
                locator: item.download_url?,
                name: item.name,
                size: item.size,
            })
        })
        .collect()
}
