//! Core types and configuration for whois-client

use crate::error::ConfigError;
use crate::resolver::ZoneConfig;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Default timeout for connecting and for each exchange
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default number of referrals to follow
pub const DEFAULT_FOLLOW: usize = 10;

/// Default response size cap in bytes
pub const DEFAULT_MAX_RESPONSE: u64 = 512 * 1024;

/// Well-known WHOIS port
pub const QUERY_PORT: u16 = 43;

/// Default location of the server directory file
pub const DEFAULT_SERVERS_FILE: &str = "./servers.json";

/// Configuration for a [`crate::WhoisClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LookupConfig {
    /// Server directory file
    pub servers_path: PathBuf,
    /// Query this server for everything, bypassing the directory
    pub server: Option<ZoneConfig>,
    pub timeout: Duration,
    /// Referrals to follow; `max_follow + 1` servers are queried at most
    pub max_follow: usize,
    /// Bytes kept from each response
    pub max_response: u64,
    pub port: u16,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            servers_path: PathBuf::from(DEFAULT_SERVERS_FILE),
            server: None,
            timeout: DEFAULT_TIMEOUT,
            max_follow: DEFAULT_FOLLOW,
            max_response: DEFAULT_MAX_RESPONSE,
            port: QUERY_PORT,
        }
    }
}

impl LookupConfig {
    pub fn with_servers_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.servers_path = path.into();
        self
    }

    pub fn with_server(mut self, zone: ZoneConfig) -> Self {
        self.server = Some(zone);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_follow(mut self, max_follow: usize) -> Self {
        self.max_follow = max_follow;
        self
    }

    pub fn with_max_response(mut self, max_response: u64) -> Self {
        self.max_response = max_response;
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Replace values that cannot produce a working exchange with defaults.
    ///
    /// A zero timeout or a zero response cap would fail or return nothing on
    /// every query. A zero `max_follow` is kept: it means "no referrals".
    pub fn normalized(mut self) -> Self {
        if self.timeout.is_zero() {
            self.timeout = DEFAULT_TIMEOUT;
        }
        if self.max_response == 0 {
            self.max_response = DEFAULT_MAX_RESPONSE;
        }
        if self.port == 0 {
            self.port = QUERY_PORT;
        }
        if self.servers_path.as_os_str().is_empty() {
            self.servers_path = PathBuf::from(DEFAULT_SERVERS_FILE);
        }
        self.server = self.server.filter(ZoneConfig::is_usable);
        self
    }

    /// Load configuration from the environment (and a `.env` file if present)
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a key lookup, starting from defaults.
    ///
    /// Recognised keys: `WHOIS_SERVERS_FILE`, `WHOIS_SERVER`,
    /// `WHOIS_TIMEOUT_SECS`, `WHOIS_MAX_FOLLOW`, `WHOIS_MAX_RESPONSE`,
    /// `WHOIS_PORT`.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("WHOIS_SERVERS_FILE").filter(|p| !p.trim().is_empty()) {
            config.servers_path = PathBuf::from(path.trim());
        }
        if let Some(host) = lookup("WHOIS_SERVER").filter(|h| !h.trim().is_empty()) {
            config.server = Some(ZoneConfig::new(host.trim()));
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "WHOIS_TIMEOUT_SECS")? {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(follow) = parse_var(&lookup, "WHOIS_MAX_FOLLOW")? {
            config.max_follow = follow;
        }
        if let Some(max) = parse_var(&lookup, "WHOIS_MAX_RESPONSE")? {
            config.max_response = max;
        }
        if let Some(port) = parse_var(&lookup, "WHOIS_PORT")? {
            config.port = port;
        }

        Ok(config)
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if !value.trim().is_empty() => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| ConfigError::invalid_value(key, value, e)),
        _ => Ok(None),
    }
}

/// Outcome of a successful lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LookupResult {
    /// Raw response text of the final server
    pub raw_data: String,
    /// Canonical domain (or IP address) that was queried
    pub domain: String,
    /// Final server actually queried
    pub referral_server: String,
    /// Number of servers contacted
    pub hops: usize,
    pub queried_at: DateTime<Utc>,
    pub duration: Duration,
}
