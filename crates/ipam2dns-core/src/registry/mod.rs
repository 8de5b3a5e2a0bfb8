//! Zone registry
//!
//! Holds every configured zone (forward and reverse) with the authoritative
//! server and TSIG key that govern it, and answers "which zone owns this name"
//! by longest strict-suffix match.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ipam2dns_core::config::SyncConfig;
//! use ipam2dns_core::registry::ZoneRegistry;
//!
//! # fn try_main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SyncConfig::load("config.yml")?;
//! let registry = ZoneRegistry::from_config(&config)?;
//!
//! let zone = registry.resolve("host.example.com.")?;
//! println!("{} is served by {}", zone.zone_name, zone.server);
//! # Ok(())
//! # }
//! ```
//!
//! The registry is built once at startup and is read-only afterwards, so it is
//! shared between tasks behind an `Arc` without locking.

use crate::config::{ServerDefinition, SyncConfig};
use crate::error::{Error, Result};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hickory_proto::rr::Name;
use hickory_proto::rr::dnssec::rdata::tsig::TsigAlgorithm;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Which configuration map a zone came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    /// Holds A records
    Forward,
    /// Holds PTR records
    Reverse,
}

/// One configured zone
///
/// `zone_name` and `key_name` are always fully qualified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneEntry {
    /// Zone apex, e.g. `example.com.`
    pub zone_name: String,
    /// Authoritative server, `host` or `host:port`
    pub server: String,
    /// TSIG key name, e.g. `ddns-key.`
    pub key_name: String,
    /// TSIG algorithm as configured
    pub algorithm: String,
    /// Base64 TSIG secret
    pub secret: String,
    /// Source map of this entry
    pub kind: ZoneKind,
}

impl ZoneEntry {
    /// Build a normalized entry from a configuration definition
    pub fn from_definition(
        zone_name: &str,
        definition: &ServerDefinition,
        kind: ZoneKind,
    ) -> Result<Self> {
        let entry = Self {
            zone_name: fqdn(zone_name),
            server: definition.server.trim().to_string(),
            key_name: fqdn(&definition.keyname),
            algorithm: definition.algo.trim().to_string(),
            secret: definition.secret.trim().to_string(),
            kind,
        };
        entry.validate()?;
        Ok(entry)
    }

    fn validate(&self) -> Result<()> {
        if self.zone_name == "." {
            return Err(Error::config("Zone name cannot be the root"));
        }
        Name::from_ascii(&self.zone_name)
            .map_err(|e| Error::config(format!("Invalid zone name {}: {}", self.zone_name, e)))?;
        if self.server.is_empty() {
            return Err(Error::config(format!(
                "Zone {} has no server configured",
                self.zone_name
            )));
        }
        if self.key_name == "." {
            return Err(Error::config(format!(
                "Zone {} has no TSIG key name configured",
                self.zone_name
            )));
        }
        Name::from_ascii(&self.key_name).map_err(|e| {
            Error::config(format!(
                "Invalid TSIG key name {} for zone {}: {}",
                self.key_name, self.zone_name, e
            ))
        })?;
        self.tsig_algorithm()?;
        self.secret_bytes()?;
        Ok(())
    }

    /// Zone apex as a DNS name
    pub fn zone_name(&self) -> Result<Name> {
        Name::from_ascii(&self.zone_name)
            .map_err(|e| Error::invalid_input(format!("{}: {}", self.zone_name, e)))
    }

    /// TSIG key name as a DNS name
    pub fn key_name(&self) -> Result<Name> {
        Name::from_ascii(&self.key_name)
            .map_err(|e| Error::invalid_input(format!("{}: {}", self.key_name, e)))
    }

    /// Decoded TSIG secret
    pub fn secret_bytes(&self) -> Result<Vec<u8>> {
        let bytes = BASE64.decode(&self.secret).map_err(|e| {
            Error::config(format!(
                "TSIG secret for zone {} is not valid base64: {}",
                self.zone_name, e
            ))
        })?;
        if bytes.is_empty() {
            return Err(Error::config(format!(
                "TSIG secret for zone {} is empty",
                self.zone_name
            )));
        }
        Ok(bytes)
    }

    /// TSIG algorithm parsed from its configured name
    pub fn tsig_algorithm(&self) -> Result<TsigAlgorithm> {
        parse_tsig_algorithm(&self.algorithm).ok_or_else(|| {
            Error::config(format!(
                "Unsupported TSIG algorithm '{}' for zone {}",
                self.algorithm, self.zone_name
            ))
        })
    }
}

/// Map a configured algorithm name to its TSIG algorithm
///
/// Accepts names with or without the trailing dot, and the legacy
/// `hmac-md5.sig-alg.reg.int` spelling.
pub fn parse_tsig_algorithm(name: &str) -> Option<TsigAlgorithm> {
    let name = name.trim().trim_end_matches('.').to_ascii_lowercase();
    let name = name.strip_suffix(".sig-alg.reg.int").unwrap_or(&name);
    match name {
        "hmac-md5" => Some(TsigAlgorithm::HmacMd5),
        "hmac-sha1" => Some(TsigAlgorithm::HmacSha1),
        "hmac-sha224" => Some(TsigAlgorithm::HmacSha224),
        "hmac-sha256" => Some(TsigAlgorithm::HmacSha256),
        "hmac-sha384" => Some(TsigAlgorithm::HmacSha384),
        "hmac-sha512" => Some(TsigAlgorithm::HmacSha512),
        _ => None,
    }
}

/// Return `name` in fully-qualified form (with a trailing dot)
///
/// The empty string becomes the root name `"."`.
pub fn fqdn(name: &str) -> String {
    let name = name.trim();
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}

/// Registry of configured zones
///
/// Entries are kept in a single ordered list: forward zones first, then
/// reverse zones, each sorted by name. Both kinds share one lookup pool.
#[derive(Debug, Clone, Default)]
pub struct ZoneRegistry {
    zones: Vec<ZoneEntry>,
}

impl ZoneRegistry {
    /// Create a registry from already-normalized entries
    pub fn new(zones: Vec<ZoneEntry>) -> Self {
        Self { zones }
    }

    /// Build the registry from configuration
    ///
    /// Normalizes zone and key names to fully-qualified form without touching
    /// `config`. Any invalid entry fails the whole load.
    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let mut zones = Vec::with_capacity(config.forward_zones.len() + config.reverse_zones.len());
        Self::collect(&config.forward_zones, ZoneKind::Forward, &mut zones)?;
        Self::collect(&config.reverse_zones, ZoneKind::Reverse, &mut zones)?;

        debug!("Zone registry built with {} zone(s)", zones.len());
        Ok(Self { zones })
    }

    fn collect(
        definitions: &BTreeMap<String, ServerDefinition>,
        kind: ZoneKind,
        zones: &mut Vec<ZoneEntry>,
    ) -> Result<()> {
        for (zone_name, definition) in definitions {
            let entry = ZoneEntry::from_definition(zone_name, definition, kind)?;
            if zones.iter().any(|z| z.zone_name.eq_ignore_ascii_case(&entry.zone_name)) {
                warn!(
                    "Zone {} is configured more than once, the later definition wins",
                    entry.zone_name
                );
            }
            zones.push(entry);
        }
        Ok(())
    }

    /// Find the zone that owns `name`
    ///
    /// Selects the longest zone name that is a strict suffix of `name`, i.e.
    /// `name` ends with `"." + zone_name`. A name equal to a zone apex does not
    /// match that zone. On equal lengths the entry encountered last wins.
    /// Comparison is ASCII case-insensitive.
    pub fn resolve(&self, name: &str) -> Result<&ZoneEntry> {
        let name = name.to_ascii_lowercase();
        let mut elected: Option<&ZoneEntry> = None;

        for zone in &self.zones {
            let suffix = format!(".{}", zone.zone_name.to_ascii_lowercase());
            if !name.ends_with(&suffix) {
                continue;
            }
            if elected.is_none_or(|current| zone.zone_name.len() >= current.zone_name.len()) {
                elected = Some(zone);
            }
        }

        elected.ok_or_else(|| Error::zone_not_found(name))
    }

    /// All configured zones in lookup order
    pub fn zones(&self) -> &[ZoneEntry] {
        &self.zones
    }

    /// Number of configured zones
    pub fn len(&self) -> usize {
        self.zones.len()
    }

    /// Whether no zone is configured
    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}
