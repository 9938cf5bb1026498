//! Error handling for whois-client

use crate::domain::DomainError;
use crate::resolver::{ProviderError, ResolveError};
use std::fmt;
use thiserror::Error;

/// Machine-readable lookup failure class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Input could not be normalized to a domain
    InvalidDomain,
    /// No WHOIS server is known for the input
    ServerNotFound,
    /// Talking to a WHOIS server failed
    Query,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidDomain => "INVALID_DOMAIN",
            ErrorCode::ServerNotFound => "SERVER_NOT_FOUND",
            ErrorCode::Query => "QUERY_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Underlying cause of a [`WhoisError`]
#[derive(Error, Debug)]
pub enum ErrorCause {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Error returned by a WHOIS lookup
#[derive(Error, Debug)]
#[error(
    "whois error [{code}] (domain: {domain}, server: {}): {source}",
    .server.as_deref().unwrap_or("")
)]
pub struct WhoisError {
    /// Domain (or raw input) that was queried
    pub domain: String,
    /// WHOIS server involved, if any was reached
    pub server: Option<String>,
    /// Machine-readable error code
    pub code: ErrorCode,
    #[source]
    pub source: ErrorCause,
}

impl WhoisError {
    pub fn new(
        domain: impl Into<String>,
        server: Option<String>,
        code: ErrorCode,
        source: impl Into<ErrorCause>,
    ) -> Self {
        Self {
            domain: domain.into(),
            server,
            code,
            source: source.into(),
        }
    }

    /// Create an input error
    pub fn invalid_domain(domain: impl Into<String>, source: DomainError) -> Self {
        Self::new(domain, None, ErrorCode::InvalidDomain, source)
    }

    /// Create a routing error
    pub fn server_not_found(domain: impl Into<String>, source: ProviderError) -> Self {
        Self::new(domain, None, ErrorCode::ServerNotFound, source)
    }

    /// Create a transport or referral error
    pub fn query(domain: impl Into<String>, source: ResolveError) -> Self {
        let server = Some(source.host().to_string());
        Self::new(domain, server, ErrorCode::Query, source)
    }

    /// Check if the failure came from a referral loop or an overlong chain
    pub fn is_referral_loop(&self) -> bool {
        matches!(
            self.source,
            ErrorCause::Resolve(ResolveError::InfinityLoop { .. })
        )
    }

    /// Get user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match (&self.code, &self.source) {
            (ErrorCode::InvalidDomain, _) => format!(
                "❌ '{}' is not a valid domain: {}\n💡 Check your input format",
                self.domain, self.source
            ),
            (ErrorCode::ServerNotFound, _) => format!(
                "❌ No WHOIS server known for '{}': {}\n💡 Add the suffix to your servers file or pass --server",
                self.domain, self.source
            ),
            (ErrorCode::Query, ErrorCause::Resolve(e)) if self.is_referral_loop() => format!(
                "⚠️  Referral chain for '{}' did not terminate: {}\n💡 Try increasing --follow or query the last server directly",
                self.domain, e
            ),
            (ErrorCode::Query, ErrorCause::Resolve(e)) if e.is_timeout() => format!(
                "⏱️  WHOIS server {} did not answer in time\n💡 Try increasing --timeout",
                e.host()
            ),
            (ErrorCode::Query, _) => format!(
                "❌ WHOIS query for '{}' failed: {}\n💡 Check your internet connection",
                self.domain, self.source
            ),
        }
    }
}

/// Errors from reading configuration (environment or command line)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Configuration error: invalid value for {key}: {value:?} ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },

    #[error("Configuration error: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub fn invalid_value(
        key: impl Into<String>,
        value: impl Into<String>,
        message: impl fmt::Display,
    ) -> Self {
        Self::InvalidValue {
            key: key.into(),
            value: value.into(),
            message: message.to_string(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, WhoisError>;
