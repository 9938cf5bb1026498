//! WHOIS lookup entry point

use crate::domain::Domain;
use crate::error::{Result, WhoisError};
use crate::resolver::{ProviderError, Resolver, ServerDirectory, ZoneConfig};
use crate::types::{LookupConfig, LookupResult};
use chrono::Utc;
use futures::future::join_all;
use std::net::IpAddr;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// Where the first server of each lookup comes from
#[derive(Debug, Clone)]
enum Routing {
    /// Every lookup goes to the same server
    Override(ZoneConfig),
    /// Pick the server from the directory by suffix
    Directory(ServerDirectory),
}

/// WHOIS client: normalizes input, routes it and follows referrals
#[derive(Debug, Clone)]
pub struct WhoisClient {
    config: LookupConfig,
    resolver: Resolver,
    routing: Routing,
}

impl WhoisClient {
    /// Create a client, loading the server directory from `config.servers_path`.
    ///
    /// With an explicit `config.server` the directory is not read at all.
    pub fn new(config: LookupConfig) -> std::result::Result<Self, ProviderError> {
        let config = config.normalized();
        let routing = match &config.server {
            Some(zone) => Routing::Override(zone.clone()),
            None => Routing::Directory(ServerDirectory::from_file(&config.servers_path)?),
        };

        Ok(Self::build(config, routing))
    }

    /// Create a client around an already built directory
    pub fn with_directory(config: LookupConfig, directory: ServerDirectory) -> Self {
        let config = config.normalized();
        let routing = match &config.server {
            Some(zone) => Routing::Override(zone.clone()),
            None => Routing::Directory(directory),
        };

        Self::build(config, routing)
    }

    fn build(config: LookupConfig, routing: Routing) -> Self {
        let resolver = Resolver::new(
            config.timeout,
            config.max_response,
            config.max_follow,
            config.port,
        );

        Self {
            config,
            resolver,
            routing,
        }
    }

    /// Look up a domain name or IP address.
    ///
    /// Follows referrals up to `max_follow` times and returns the raw text of
    /// the last server in the chain.
    pub async fn lookup(&self, cancel: &CancellationToken, input: &str) -> Result<LookupResult> {
        let started = Instant::now();
        let queried_at = Utc::now();

        let (subject, zone) = self.route(input)?;

        let resolution = self
            .resolver
            .resolve_with_referrals(cancel, &subject, &zone)
            .await
            .map_err(|e| {
                tracing::warn!(
                    domain = %subject,
                    server = %e.host(),
                    error = %e,
                    "WHOIS lookup failed"
                );
                WhoisError::query(subject.clone(), e)
            })?;

        let duration = started.elapsed();
        tracing::debug!(
            domain = %subject,
            server = %resolution.server,
            hops = resolution.hops,
            duration_ms = %duration.as_millis(),
            "WHOIS lookup completed"
        );

        Ok(LookupResult {
            raw_data: resolution.raw,
            domain: subject,
            referral_server: resolution.server,
            hops: resolution.hops,
            queried_at,
            duration,
        })
    }

    /// Look up several inputs concurrently, one result per input in order
    pub async fn lookup_batch(
        &self,
        cancel: &CancellationToken,
        inputs: &[String],
    ) -> Vec<Result<LookupResult>> {
        let batch_start = Instant::now();
        let results = join_all(inputs.iter().map(|input| self.lookup(cancel, input))).await;

        let errors = results.iter().filter(|r| r.is_err()).count();
        tracing::info!(
            lookups = inputs.len(),
            errors,
            batch_duration_ms = %batch_start.elapsed().as_millis(),
            "Batch lookup completed"
        );

        results
    }

    /// Resolve input to the query subject and the first server to ask
    fn route(&self, input: &str) -> Result<(String, ZoneConfig)> {
        if let Ok(ip) = input.trim().parse::<IpAddr>() {
            let subject = ip.to_string();
            let zone = match &self.routing {
                Routing::Override(zone) => zone.clone(),
                Routing::Directory(directory) => directory
                    .ip_server()
                    .map_err(|e| WhoisError::server_not_found(subject.clone(), e))?,
            };
            return Ok((subject, zone));
        }

        let domain = Domain::parse(input).map_err(|e| WhoisError::invalid_domain(input, e))?;
        let subject = domain.to_string();
        let zone = match &self.routing {
            Routing::Override(zone) => zone.clone(),
            Routing::Directory(directory) => directory
                .get_server(&domain)
                .map_err(|e| WhoisError::server_not_found(subject.clone(), e))?,
        };

        Ok((subject, zone))
    }

    /// Get client configuration
    pub fn config(&self) -> &LookupConfig {
        &self.config
    }

    /// Check if lookups bypass the server directory
    pub fn has_server_override(&self) -> bool {
        matches!(self.routing, Routing::Override(_))
    }
}
