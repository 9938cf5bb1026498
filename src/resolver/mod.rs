//! WHOIS server routing and the TCP query/response exchange

pub mod provider;
pub mod query;
pub mod referral;

pub use provider::{ProviderError, ServerDirectory};
pub use query::build_query;
pub use referral::{find_referral_server, follow_referrals, Resolution};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::io;
use std::time::{Duration, Instant as StdInstant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tokio_util::sync::CancellationToken;

/// How to query one WHOIS server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// WHOIS server hostname
    pub host: String,
    /// Query template with a `$addr` placeholder; `None` means `"$addr\r\n"`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

impl ZoneConfig {
    /// Zone using the default query template
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            query: None,
        }
    }

    /// Zone with a custom query template. An empty template means the default.
    pub fn with_query(host: impl Into<String>, query: impl Into<String>) -> Self {
        let query = query.into();
        Self {
            host: host.into(),
            query: (!query.is_empty()).then_some(query),
        }
    }

    /// A zone can only be queried if it names a host
    pub fn is_usable(&self) -> bool {
        !self.host.trim().is_empty()
    }
}

/// Errors from talking to WHOIS servers
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("resolver: failed to connect to {host}: {source}")]
    ConnectionFailed {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("resolver: failed to set deadline for {host}")]
    SetDeadlineFailed { host: String },

    #[error("resolver: failed to write query to {host}: {source}")]
    WriteQueryFailed {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("resolver: failed to read response from {host}: {source}")]
    ReadResponseFailed {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("resolver: request to {host} timed out after {}s", .timeout.as_secs_f64())]
    RequestTimeout { host: String, timeout: Duration },

    #[error("resolver: whois query failed ({host}): {source}")]
    WhoisQueryFailed {
        host: String,
        #[source]
        source: Box<ResolveError>,
    },

    #[error("resolver: referral loop detected or max follow exceeded ({host}, {attempts} attempts)")]
    InfinityLoop { host: String, attempts: usize },
}

impl ResolveError {
    /// Server the error is about
    pub fn host(&self) -> &str {
        match self {
            Self::ConnectionFailed { host, .. }
            | Self::SetDeadlineFailed { host }
            | Self::WriteQueryFailed { host, .. }
            | Self::ReadResponseFailed { host, .. }
            | Self::RequestTimeout { host, .. }
            | Self::WhoisQueryFailed { host, .. }
            | Self::InfinityLoop { host, .. } => host,
        }
    }

    /// Check if the failure was a read deadline, at any wrapping depth
    pub fn is_timeout(&self) -> bool {
        match self {
            Self::RequestTimeout { .. } => true,
            Self::WhoisQueryFailed { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Check if the failure was caused by the caller cancelling the lookup
    pub fn is_cancelled(&self) -> bool {
        match self {
            Self::ConnectionFailed { source, .. }
            | Self::WriteQueryFailed { source, .. }
            | Self::ReadResponseFailed { source, .. } => {
                source.kind() == io::ErrorKind::Interrupted
            }
            Self::WhoisQueryFailed { source, .. } => source.is_cancelled(),
            _ => false,
        }
    }
}

/// Lossy UTF-8 decoding that never grows past `max_len` bytes.
///
/// A multi-byte character cut by the size cap, or an invalid byte, decodes to
/// U+FFFD (3 bytes); the text is cut back to the last char boundary that fits.
fn decode_response(buf: &[u8], max_len: usize) -> String {
    let mut text = String::from_utf8_lossy(buf).into_owned();
    if text.len() > max_len {
        let mut end = max_len;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

fn cancelled() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "lookup cancelled")
}

/// A single WHOIS query/response round trip
#[async_trait]
pub trait WhoisExchange: Send + Sync {
    /// Send the query for `target` to `zone` and return the raw response
    async fn exchange(
        &self,
        cancel: &CancellationToken,
        target: &str,
        zone: &ZoneConfig,
    ) -> Result<String, ResolveError>;
}

/// TCP WHOIS resolver with bounded time and response size
#[derive(Debug, Clone)]
pub struct Resolver {
    timeout: Duration,
    port: u16,
    max_response: u64,
    max_follow: usize,
}

impl Resolver {
    pub fn new(timeout: Duration, max_response: u64, max_follow: usize, port: u16) -> Self {
        Self {
            timeout,
            port,
            max_response,
            max_follow,
        }
    }

    /// Query a single server.
    ///
    /// Connecting is bounded by the timeout and observes `cancel`. Write and
    /// read share one absolute deadline. At most `max_response` bytes are
    /// read; anything beyond is left unread and the response is returned as-is.
    pub async fn resolve(
        &self,
        cancel: &CancellationToken,
        target: &str,
        zone: &ZoneConfig,
    ) -> Result<String, ResolveError> {
        let host = zone.host.as_str();
        let started = StdInstant::now();

        let connect = timeout(self.timeout, TcpStream::connect((host, self.port)));
        let mut stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                return Err(ResolveError::ConnectionFailed { host: host.to_string(), source: cancelled() });
            }
            res = connect => match res {
                Ok(Ok(stream)) => stream,
                Ok(Err(source)) => {
                    return Err(ResolveError::ConnectionFailed { host: host.to_string(), source });
                }
                Err(_) => {
                    return Err(ResolveError::ConnectionFailed {
                        host: host.to_string(),
                        source: io::Error::new(io::ErrorKind::TimedOut, "connect timed out"),
                    });
                }
            },
        };

        let deadline = Instant::now()
            .checked_add(self.timeout)
            .ok_or_else(|| ResolveError::SetDeadlineFailed {
                host: host.to_string(),
            })?;

        let query = build_query(zone, target);
        let written = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(cancelled()),
            res = timeout_at(deadline, stream.write_all(query.as_bytes())) => res.unwrap_or_else(|_| {
                Err(io::Error::new(io::ErrorKind::TimedOut, "write deadline exceeded"))
            }),
        };
        written.map_err(|source| ResolveError::WriteQueryFailed {
            host: host.to_string(),
            source,
        })?;

        let mut buf = Vec::new();
        let mut limited = (&mut stream).take(self.max_response);
        let read = limited.read_to_end(&mut buf);
        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Some(Err(cancelled())),
            res = timeout_at(deadline, read) => res.ok(),
        };
        match outcome {
            Some(Ok(_)) => {}
            Some(Err(source)) if source.kind() == io::ErrorKind::TimedOut => {
                return Err(ResolveError::RequestTimeout {
                    host: host.to_string(),
                    timeout: self.timeout,
                });
            }
            Some(Err(source)) => {
                return Err(ResolveError::ReadResponseFailed {
                    host: host.to_string(),
                    source,
                });
            }
            None => {
                return Err(ResolveError::RequestTimeout {
                    host: host.to_string(),
                    timeout: self.timeout,
                });
            }
        }

        let truncated = buf.len() as u64 >= self.max_response;
        tracing::debug!(
            query = %target,
            server = %host,
            bytes = buf.len(),
            truncated,
            duration_ms = %started.elapsed().as_millis(),
            "WHOIS exchange completed"
        );

        let max_len = usize::try_from(self.max_response).unwrap_or(usize::MAX);
        Ok(decode_response(&buf, max_len))
    }

    /// Query `zone` and follow referrals up to `max_follow` times
    pub async fn resolve_with_referrals(
        &self,
        cancel: &CancellationToken,
        target: &str,
        zone: &ZoneConfig,
    ) -> Result<Resolution, ResolveError> {
        follow_referrals(self, self.max_follow, cancel, target, zone).await
    }
}

#[async_trait]
impl WhoisExchange for Resolver {
    async fn exchange(
        &self,
        cancel: &CancellationToken,
        target: &str,
        zone: &ZoneConfig,
    ) -> Result<String, ResolveError> {
        self.resolve(cancel, target, zone).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// Accept one connection, capture the query line, answer with `body`
    async fn one_shot_server(body: Vec<u8>) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut query = Vec::new();
            let mut byte = [0u8; 1];
            while socket.read_exact(&mut byte).await.is_ok() {
                query.push(byte[0]);
                if byte[0] == b'\n' {
                    break;
                }
            }
            let _ = socket.write_all(&body).await;
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&query).into_owned()
        });
        (port, handle)
    }

    fn resolver(port: u16) -> Resolver {
        Resolver::new(Duration::from_secs(5), 1024, 10, port)
    }

    #[test]
    fn test_zone_config() {
        assert_eq!(ZoneConfig::with_query("h", "").query, None);
        assert!(ZoneConfig::new("whois.nic.io").is_usable());
        assert!(!ZoneConfig::new("  ").is_usable());
    }

    #[tokio::test]
    async fn test_resolve_sends_query_and_reads_response() {
        let (port, server) = one_shot_server(b"Domain Name: EXAMPLE.COM\r\n".to_vec()).await;
        let cancel = CancellationToken::new();

        let raw = resolver(port)
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap();

        assert_eq!(raw, "Domain Name: EXAMPLE.COM\r\n");
        assert_eq!(server.await.unwrap(), "example.com\r\n");
    }

    #[tokio::test]
    async fn test_resolve_uses_zone_template() {
        let (port, server) = one_shot_server(b"ok".to_vec()).await;
        let cancel = CancellationToken::new();
        let zone = ZoneConfig::with_query("127.0.0.1", "domain $addr\n");

        resolver(port).resolve(&cancel, "example.de", &zone).await.unwrap();

        assert_eq!(server.await.unwrap(), "domain example.de\n");
    }

    #[tokio::test]
    async fn test_oversized_response_is_truncated() {
        let (port, _server) = one_shot_server(vec![b'x'; 4096]).await;
        let cancel = CancellationToken::new();

        let raw = resolver(port)
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap();

        assert_eq!(raw.len(), 1024);
    }

    #[tokio::test]
    async fn test_truncation_inside_multibyte_char_stays_within_cap() {
        let mut body = vec![b'x'; 1023];
        body.extend_from_slice("é".as_bytes());
        body.extend(std::iter::repeat(b'y').take(100));
        let (port, _server) = one_shot_server(body).await;
        let cancel = CancellationToken::new();

        let raw = resolver(port)
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap();

        assert!(raw.len() <= 1024);
        assert_eq!(raw, "x".repeat(1023));
    }

    #[test]
    fn test_decode_response() {
        assert_eq!(decode_response(b"plain", 16), "plain");
        assert_eq!(decode_response("h\u{e9}".as_bytes(), 3), "h\u{e9}");
        // cut inside a two-byte char
        assert_eq!(decode_response(&[b'a', 0xC3], 2), "a");
        // invalid byte decodes to U+FFFD only when it fits
        assert_eq!(decode_response(&[b'a', b'b', 0xE9], 3), "ab");
        assert_eq!(decode_response(&[b'a', 0xE9], 8), "a\u{FFFD}");
        assert_eq!(decode_response(&[0xE9], 1), "");
    }

    #[tokio::test]
    async fn test_connection_refused() {
        // Bind then drop to get a port nobody listens on
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let cancel = CancellationToken::new();

        let err = resolver(port)
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::ConnectionFailed { .. }));
        assert_eq!(err.host(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_read_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
            drop(socket);
        });
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(Duration::from_millis(200), 1024, 10, port);

        let err = resolver
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::RequestTimeout { .. }));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_cancelled_before_connect() {
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = resolver(43)
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::ConnectionFailed { .. }));
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_during_read() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = resolver(port)
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::ReadResponseFailed { .. }));
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_deadline_overflow() {
        let (port, _server) = one_shot_server(b"ok".to_vec()).await;
        let cancel = CancellationToken::new();
        let resolver = Resolver::new(Duration::MAX, 1024, 10, port);

        let err = resolver
            .resolve(&cancel, "example.com", &ZoneConfig::new("127.0.0.1"))
            .await
            .unwrap_err();

        assert!(matches!(err, ResolveError::SetDeadlineFailed { .. }));
    }

    #[test]
    fn test_error_wrapping() {
        let inner = ResolveError::RequestTimeout {
            host: "whois.b".to_string(),
            timeout: Duration::from_secs(30),
        };
        let err = ResolveError::WhoisQueryFailed {
            host: "whois.b".to_string(),
            source: Box::new(inner),
        };

        assert!(err.is_timeout());
        assert!(!err.is_cancelled());
        assert_eq!(err.host(), "whois.b");
        assert!(std::error::Error::source(&err).is_some());
    }
}
