//! WHOIS server directory
//!
//! Maps canonical public suffixes to the server that answers for them, with
//! an optional fallback server for IP address queries. Built once, read-only
//! afterwards, so it can be shared freely between concurrent lookups.

use super::ZoneConfig;
use crate::domain::Domain;
use serde::Deserialize;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while building or querying the server directory
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("provider: config read failed ({}): {source}", .path.display())]
    ConfigReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("provider: config parse failed: {0}")]
    ConfigParseFailed(#[from] serde_json::Error),

    #[error("provider: empty zone config")]
    EmptyZoneConfig,

    #[error("provider: TLD not supported: {tld}")]
    TldNotSupported { tld: String },

    #[error("provider: invalid domain")]
    InvalidDomain,

    #[error("provider: no WHOIS server configured for IP addresses")]
    IpNotSupported,
}

/// On-disk layout of the directory file
#[derive(Debug, Deserialize)]
struct RawDirectory {
    #[serde(default)]
    zones: Option<HashMap<String, RawZone>>,
    #[serde(default)]
    ip: Option<RawZone>,
}

#[derive(Debug, Deserialize)]
struct RawZone {
    #[serde(default)]
    host: String,
    #[serde(default)]
    query: Option<String>,
}

impl From<RawZone> for ZoneConfig {
    fn from(raw: RawZone) -> Self {
        match raw.query {
            Some(query) => ZoneConfig::with_query(raw.host, query),
            None => ZoneConfig::new(raw.host),
        }
    }
}

/// Immutable TLD → WHOIS server mapping
#[derive(Debug, Clone)]
pub struct ServerDirectory {
    zones: HashMap<String, ZoneConfig>,
    ip: Option<ZoneConfig>,
}

impl ServerDirectory {
    /// Build a directory from explicit entries.
    ///
    /// Entries with an empty host are dropped and keys are brought to the
    /// canonical suffix form. Fails if nothing usable remains.
    pub fn new(
        zones: HashMap<String, ZoneConfig>,
        ip: Option<ZoneConfig>,
    ) -> Result<Self, ProviderError> {
        let mut entries: Vec<(String, String, ZoneConfig)> = zones
            .into_iter()
            .filter(|(_, zone)| zone.is_usable())
            .filter_map(|(key, zone)| canonical_tld(&key).map(|tld| (tld, key, zone)))
            .collect();
        // On a collision, a key already in canonical form wins, then the
        // lexically smallest spelling.
        entries.sort_by(|a, b| (a.1 != a.0, &a.1).cmp(&(b.1 != b.0, &b.1)));

        let mut zones: HashMap<String, ZoneConfig> = HashMap::with_capacity(entries.len());
        for (tld, key, zone) in entries {
            match zones.entry(tld) {
                Entry::Occupied(kept) => {
                    tracing::warn!(
                        tld = %kept.key(),
                        ignored = %key,
                        host = %zone.host,
                        "Duplicate zone after canonicalization, keeping the first"
                    );
                }
                Entry::Vacant(slot) => {
                    slot.insert(zone);
                }
            }
        }

        if zones.is_empty() {
            return Err(ProviderError::EmptyZoneConfig);
        }

        let ip = ip.filter(ZoneConfig::is_usable);

        tracing::debug!(
            zones = zones.len(),
            ip_fallback = ip.is_some(),
            "Server directory loaded"
        );

        Ok(Self { zones, ip })
    }

    /// Load the directory from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProviderError> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|source| ProviderError::ConfigReadFailed {
                path: path.to_path_buf(),
                source,
            })?;

        Self::from_json_str(&content)
    }

    /// Load the directory from an in-memory JSON document
    pub fn from_json_str(content: &str) -> Result<Self, ProviderError> {
        let raw: RawDirectory = serde_json::from_str(content)?;

        let zones = raw
            .zones
            .unwrap_or_default()
            .into_iter()
            .map(|(tld, zone)| (tld, ZoneConfig::from(zone)))
            .collect();

        Self::new(zones, raw.ip.map(ZoneConfig::from))
    }

    /// Look up the server responsible for `domain`'s suffix.
    ///
    /// Matching is exact on the canonical suffix; `example.co.uk` only hits
    /// a `co.uk` entry, never `uk`.
    pub fn get_server(&self, domain: &Domain) -> Result<ZoneConfig, ProviderError> {
        if domain.tld.is_empty() {
            return Err(ProviderError::InvalidDomain);
        }

        self.zones
            .get(&domain.tld)
            .cloned()
            .ok_or_else(|| ProviderError::TldNotSupported {
                tld: domain.tld.clone(),
            })
    }

    /// Fallback server for IP address queries
    pub fn ip_server(&self) -> Result<ZoneConfig, ProviderError> {
        self.ip.clone().ok_or(ProviderError::IpNotSupported)
    }

    /// Check if the directory has an entry for the given canonical suffix
    pub fn supports_tld(&self, tld: &str) -> bool {
        self.zones.contains_key(tld)
    }

    /// Number of configured suffixes
    pub fn zone_count(&self) -> usize {
        self.zones.len()
    }
}

/// Bring a configured key to the form [`Domain::parse`] produces
fn canonical_tld(key: &str) -> Option<String> {
    let key = key.trim().trim_start_matches('.').to_lowercase();
    if key.is_empty() {
        return None;
    }

    match idna::domain_to_ascii(&key) {
        Ok(ascii) => Some(ascii),
        Err(_) => {
            tracing::warn!(tld = %key, "Skipping zone with unencodable suffix");
            None
        }
    }
}
