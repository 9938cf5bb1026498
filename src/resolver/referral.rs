//! Referral detection and the referral-following loop

use super::{ResolveError, WhoisExchange, ZoneConfig};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use tokio_util::sync::CancellationToken;

const REFERRAL_PATTERN: &str = r"(?mi)^[ \t]*(?:registrar[ \t]+)?(?:whois[ \t]+server|referralserver)[ \t]*:[ \t]*(?:[a-z][a-z0-9+.\-]*://)?([^\s:/]+)(?::\d+)?/?[ \t\r]*$";

fn referral_regex() -> Option<&'static Regex> {
    static REGEX: OnceLock<Option<Regex>> = OnceLock::new();
    REGEX
        .get_or_init(|| Regex::new(REFERRAL_PATTERN).ok())
        .as_ref()
}

/// Extract the referred server from a WHOIS response, if any.
///
/// Recognises `Whois Server:`, `Registrar WHOIS Server:` and `ReferralServer:`
/// lines. Scheme, port and trailing slash are dropped.
pub fn find_referral_server(data: &str) -> Option<String> {
    referral_regex()?
        .captures(data)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|host| !host.is_empty())
}

/// Outcome of a referral chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Raw response of the last server in the chain
    pub raw: String,
    /// Host that produced `raw`
    pub server: String,
    /// Number of servers queried
    pub hops: usize,
}

/// Query `initial` and keep following referrals.
///
/// At most `max_follow + 1` servers are queried. Revisiting a host stops the
/// chain and reports [`ResolveError::InfinityLoop`]; the response that led to
/// the revisit is not returned.
pub async fn follow_referrals<E>(
    exchange: &E,
    max_follow: usize,
    cancel: &CancellationToken,
    target: &str,
    initial: &ZoneConfig,
) -> Result<Resolution, ResolveError>
where
    E: WhoisExchange + ?Sized,
{
    let mut visited: HashSet<String> = HashSet::new();
    let mut zone = initial.clone();
    let mut attempts = 0usize;

    for hop in 0..=max_follow {
        if !visited.insert(zone.host.to_ascii_lowercase()) {
            tracing::debug!(query = %target, server = %zone.host, hop, "Referral loop detected");
            break;
        }

        attempts += 1;
        let raw = exchange
            .exchange(cancel, target, &zone)
            .await
            .map_err(|e| ResolveError::WhoisQueryFailed {
                host: zone.host.clone(),
                source: Box::new(e),
            })?;

        match find_referral_server(&raw) {
            Some(next) if !next.eq_ignore_ascii_case(&zone.host) => {
                tracing::debug!(
                    query = %target,
                    server = %zone.host,
                    referral = %next,
                    hop,
                    "Following referral"
                );
                zone = ZoneConfig::new(next);
            }
            _ => {
                return Ok(Resolution {
                    raw,
                    server: zone.host,
                    hops: attempts,
                });
            }
        }
    }

    Err(ResolveError::InfinityLoop {
        host: zone.host,
        attempts,
    })
}
