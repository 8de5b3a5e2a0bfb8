//! Configuration types for the ipam2dns system
//!
//! The on-disk format is YAML. Zone maps keep the historical
//! `forward zones` / `reverse zones` keys so existing deployments load unchanged.
//!
//! The changelog is read either straight from the phpIPAM database (`dsn`)
//! or from an HTTP feed (`source`). Exactly one of the two must be set.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// phpIPAM MySQL database holding the `changelog` table
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsn: Option<String>,

    /// HTTP changelog feed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceConfig>,

    /// Forward zones keyed by zone name
    #[serde(rename = "forward zones", alias = "forward_zones", default)]
    pub forward_zones: BTreeMap<String, ServerDefinition>,

    /// Reverse zones keyed by zone name
    #[serde(rename = "reverse zones", alias = "reverse_zones", default)]
    pub reverse_zones: BTreeMap<String, ServerDefinition>,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Read and parse a YAML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, crate::Error> {
        let path = path.as_ref();
        let data = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse(&data)
    }

    /// Parse a YAML configuration document
    pub fn parse(data: &str) -> Result<Self, crate::Error> {
        let config: Self = serde_yaml::from_str(data)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// Zone definitions are validated while building the
    /// [`ZoneRegistry`](crate::registry::ZoneRegistry).
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.forward_zones.is_empty() && self.reverse_zones.is_empty() {
            return Err(crate::Error::config("No forward or reverse zones configured"));
        }

        self.change_source()?;
        self.engine.validate()?;

        Ok(())
    }

    /// The change source this configuration selects
    pub fn change_source(&self) -> Result<ChangeSourceSelection<'_>, crate::Error> {
        match (self.dsn.as_deref(), &self.source) {
            (Some(dsn), None) => {
                if dsn.trim().is_empty() {
                    return Err(crate::Error::config("Database DSN cannot be empty"));
                }
                Ok(ChangeSourceSelection::Database(dsn))
            }
            (None, Some(source)) => {
                source.validate()?;
                Ok(ChangeSourceSelection::Feed(source))
            }
            (Some(_), Some(_)) => Err(crate::Error::config(
                "Configure either `dsn` or `source`, not both",
            )),
            (None, None) => Err(crate::Error::config(
                "No change source configured (`dsn` or `source`)",
            )),
        }
    }
}

/// Where the changelog comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeSourceSelection<'a> {
    /// phpIPAM database DSN
    Database(&'a str),
    /// HTTP changelog feed
    Feed(&'a SourceConfig),
}

/// Authoritative server and TSIG key for one zone
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerDefinition {
    /// Server host, optionally with `:port`
    pub server: String,

    /// TSIG algorithm name (e.g. "hmac-sha256")
    #[serde(alias = "algorithm")]
    pub algo: String,

    /// TSIG key name
    #[serde(alias = "key_name")]
    pub keyname: String,

    /// Base64 TSIG secret
    pub secret: String,
}

/// HTTP changelog feed configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Feed URL, queried with `?after=<cursor>`
    pub url: String,

    /// Optional bearer token
    #[serde(default)]
    pub token: Option<String>,

    /// Request timeout (in seconds)
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
}

impl SourceConfig {
    /// Validate the source configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.url.is_empty() {
            return Err(crate::Error::config("Change source URL cannot be empty"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(crate::Error::config(format!(
                "Change source URL must use HTTP or HTTPS scheme. Got: {}",
                self.url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(crate::Error::config("Change source timeout must be > 0"));
        }
        Ok(())
    }
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Delay between changelog polls (in seconds)
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Timeout for each DNS query and update exchange (in seconds)
    #[serde(default = "default_dns_timeout_secs")]
    pub dns_timeout_secs: u64,

    /// Capacity of the internal event channel
    ///
    /// When full, new engine events are dropped (with a warning log).
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.poll_interval_secs == 0 {
            return Err(crate::Error::config("Poll interval must be > 0"));
        }
        if self.dns_timeout_secs == 0 {
            return Err(crate::Error::config("DNS timeout must be > 0"));
        }
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("Event channel capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            dns_timeout_secs: default_dns_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

fn default_source_timeout_secs() -> u64 {
    10
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_dns_timeout_secs() -> u64 {
    5
}

fn default_event_channel_capacity() -> usize {
    1000
}
