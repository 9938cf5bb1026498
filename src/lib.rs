//! whois-client - WHOIS protocol client
//!
//! Normalizes a domain against the public suffix list, picks the WHOIS server
//! for its suffix, queries it over TCP port 43 and follows referrals until a
//! server answers without pointing elsewhere.

pub mod client;
pub mod domain;
pub mod error;
pub mod resolver;
pub mod types;

// Re-export commonly used types
pub use client::WhoisClient;
pub use domain::{Domain, DomainError};
pub use error::{ConfigError, ErrorCause, ErrorCode, Result, WhoisError};
pub use resolver::{ProviderError, ResolveError, Resolver, ServerDirectory, ZoneConfig};
pub use types::{LookupConfig, LookupResult};

// Callers need a token to run lookups
pub use tokio_util::sync::CancellationToken;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

