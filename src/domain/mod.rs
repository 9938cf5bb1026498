//! Domain name normalization
//!
//! Turns raw user input into a canonical [`Domain`]: trimmed, lower-cased,
//! IDNA-encoded and split at its public suffix.

pub mod validator;

pub use validator::{is_valid, validate};

use std::fmt;
use thiserror::Error;

/// Errors produced while normalizing a domain name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain: empty domain")]
    Empty,

    #[error("domain: invalid domain: {reason}")]
    Invalid { reason: String },

    #[error("domain: failed to determine public suffix")]
    PublicSuffix,
}

impl DomainError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        Self::Invalid {
            reason: reason.into(),
        }
    }
}

/// A parsed, canonical domain name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Domain {
    /// Original input, kept for diagnostics only
    pub raw: String,
    /// Registrable label in front of the public suffix (may be empty)
    pub name: String,
    /// Public suffix, lower-case ASCII
    pub tld: String,
    /// Whether the suffix comes from the ICANN section of the suffix list
    pub icann: bool,
}

impl Domain {
    /// Parse and normalize a raw domain string.
    ///
    /// Subdomains are dropped: `sub.example.co.uk` becomes `example` + `co.uk`.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let norm = raw.trim().to_lowercase();
        if norm.is_empty() {
            return Err(DomainError::Empty);
        }

        let ascii = idna::domain_to_ascii(&norm)
            .map_err(|e| DomainError::invalid(format!("IDNA conversion failed: {}", e)))?;

        validate(&ascii)?;

        let suffix = psl::suffix(ascii.as_bytes()).ok_or(DomainError::PublicSuffix)?;
        let tld = std::str::from_utf8(suffix.as_bytes())
            .map_err(|_| DomainError::PublicSuffix)?
            .to_string();
        if tld.is_empty() {
            return Err(DomainError::PublicSuffix);
        }
        let icann = matches!(suffix.typ(), Some(psl::Type::Icann));

        let registrable = psl::domain(ascii.as_bytes()).ok_or(DomainError::PublicSuffix)?;
        let registrable =
            std::str::from_utf8(registrable.as_bytes()).map_err(|_| DomainError::PublicSuffix)?;

        let name = registrable
            .strip_suffix(tld.as_str())
            .map(|rest| rest.strip_suffix('.').unwrap_or(rest))
            .unwrap_or_default()
            .to_string();

        tracing::trace!(raw = %raw, name = %name, tld = %tld, icann, "Domain parsed");

        Ok(Self {
            raw: raw.to_string(),
            name,
            tld,
            icann,
        })
    }

    /// Whether the suffix is a private (non-ICANN) one, e.g. `blogspot.com`
    pub fn is_custom(&self) -> bool {
        !self.icann
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.tld)
        } else {
            write!(f, "{}.{}", self.name, self.tld)
        }
    }
}

impl std::str::FromStr for Domain {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
