// # HTTP Change Source
//
// ChangeSource implementation that polls an IPAM changelog feed over HTTP.
//
// ## Feed
//
// `GET {url}?after={cursor}` with an optional bearer token returns
//
// ```json
// {
//   "max_id": 4215,
//   "changes": [
//     {"cid": 4212, "action": "add", "hostname": "web1.example.com", "ip": "192.0.2.10", "diff": "..."}
//   ]
// }
// ```
//
// Entries carry the columns of the phpIPAM changelog table. `hostname` and
// `ip` may be null or empty; row conversion and filtering are shared with
// the database source (`ipam2dns_core::changelog`).

use async_trait::async_trait;
use ipam2dns_core::config::SourceConfig;
use ipam2dns_core::changelog::ChangelogRow;
use ipam2dns_core::traits::{ChangeBatch, ChangeSource};
use ipam2dns_core::{Error, Result};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// One page of the changelog feed
#[derive(Debug, Default, Deserialize)]
struct ChangelogPage {
    #[serde(default)]
    max_id: Option<u64>,
    #[serde(default)]
    changes: Vec<ChangelogEntry>,
}

/// One changelog row as served by the feed
#[derive(Debug, Clone, Deserialize)]
struct ChangelogEntry {
    cid: u64,
    action: String,
    #[serde(default)]
    hostname: Option<String>,
    #[serde(default)]
    ip: Option<String>,
    #[serde(default)]
    diff: Option<String>,
}

impl From<ChangelogEntry> for ChangelogRow {
    fn from(entry: ChangelogEntry) -> Self {
        ChangelogRow {
            cid: entry.cid,
            action: entry.action,
            hostname: entry.hostname,
            ip: entry.ip,
            diff: entry.diff,
        }
    }
}

/// HTTP changelog feed source
pub struct HttpChangeSource {
    /// Feed URL, without the `after` parameter
    url: String,

    /// Bearer token
    /// ⚠️ NEVER log this value
    token: Option<String>,

    /// HTTP client
    client: reqwest::Client,
}

// Custom Debug implementation that hides the token
impl std::fmt::Debug for HttpChangeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpChangeSource")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl HttpChangeSource {
    /// Create a new feed source
    ///
    /// # Parameters
    ///
    /// - `url`: Feed URL (http or https)
    /// - `token`: Optional bearer token
    /// - `timeout`: Per-request timeout
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            token: token.filter(|t| !t.trim().is_empty()),
            client,
        })
    }

    /// Create a feed source from the `source` configuration section
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        config.validate()?;
        Self::new(
            config.url.clone(),
            config.token.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    async fn fetch_page(&self, after: u64) -> Result<ChangelogPage> {
        let mut request = self.client.get(&self.url).query(&[("after", after)]);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::change_source(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::change_source(format!(
                "HTTP error: {}",
                response.status()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| Error::change_source(format!("Failed to read response: {}", e)))?;

        serde_json::from_str(&body)
            .map_err(|e| Error::change_source(format!("Malformed changelog feed: {}", e)))
    }
}

#[async_trait]
impl ChangeSource for HttpChangeSource {
    async fn fetch_changes(&self, after: u64) -> Result<ChangeBatch> {
        let page = self.fetch_page(after).await?;
        Ok(into_batch(page, after))
    }

    fn source_name(&self) -> &'static str {
        "http"
    }
}

/// Turn a feed page into an ordered batch of events after `after`
fn into_batch(page: ChangelogPage, after: u64) -> ChangeBatch {
    let mut entries = page.changes;
    entries.sort_by_key(|entry| entry.cid);

    let largest_cid = entries.last().map(|entry| entry.cid).unwrap_or(0);
    let high_water = page.max_id.unwrap_or(0).max(largest_cid).max(after);

    let events = entries
        .into_iter()
        .filter(|entry| {
            if entry.cid <= after {
                debug!("Ignoring change {} at or before cursor {}", entry.cid, after);
                return false;
            }
            true
        })
        .filter_map(|entry| ChangelogRow::from(entry).into_event())
        .collect();

    ChangeBatch { events, high_water }
}
