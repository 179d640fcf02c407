use std::net::SocketAddr;
use std::time::Duration;
use url::Url;

use crate::cli::Cli;
use crate::error::{Result, StarQueryError};
use crate::models::{RepoRef, STARGAZER_TTL_SECS};

/// Immutable process configuration, built once at startup and passed to
/// each component's constructor.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub github_token: Option<String>,
    pub redis_url: Option<String>,
    pub redis_pool_size: usize,
    pub webhook_secret: Vec<u8>,
    pub repos: Vec<RepoRef>,
    pub sweep_interval: Duration,
    pub entry_ttl_secs: u64,
    pub graphql_url: Url,
    pub api_url: Url,
    pub ip_filter_refresh: Option<Duration>,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let bind_address = cli.bind_address.parse().map_err(|e| {
            StarQueryError::Config(format!("Invalid bind address {}: {}", cli.bind_address, e))
        })?;

        let webhook_secret = cli
            .webhook_secret
            .filter(|s| !s.is_empty())
            .ok_or_else(|| StarQueryError::Config("missing WEBHOOK_SECRET".to_string()))?;

        if cli.repos.is_empty() {
            return Err(StarQueryError::Config("no repositories to track".to_string()));
        }
        if cli.sweep_interval_secs == 0 {
            return Err(StarQueryError::Config("sweep interval must be positive".to_string()));
        }

        let graphql_url = parse_url("GraphQL", &cli.graphql_url)?;
        let api_url = parse_url("API", &cli.api_url)?;

        Ok(Config {
            bind_address,
            github_token: cli.github_token.filter(|t| !t.is_empty()),
            redis_url: cli.redis_url.filter(|u| !u.is_empty()),
            redis_pool_size: cli.redis_pool_size.max(1),
            webhook_secret: webhook_secret.into_bytes(),
            repos: cli.repos,
            sweep_interval: Duration::from_secs(cli.sweep_interval_secs),
            entry_ttl_secs: STARGAZER_TTL_SECS,
            graphql_url,
            api_url,
            ip_filter_refresh: cli
                .ip_filter
                .then(|| Duration::from_secs(cli.ip_filter_refresh_secs.max(1))),
        })
    }

    /// Configuration for tests and embedding: in-memory store, default endpoints.
    pub fn new(webhook_secret: impl Into<Vec<u8>>, repos: Vec<RepoRef>) -> Result<Self> {
        Ok(Config {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            github_token: None,
            redis_url: None,
            redis_pool_size: 16,
            webhook_secret: webhook_secret.into(),
            repos,
            sweep_interval: crate::models::DEFAULT_SWEEP_INTERVAL,
            entry_ttl_secs: STARGAZER_TTL_SECS,
            graphql_url: parse_url("GraphQL", crate::github::GRAPHQL_URL)?,
            api_url: parse_url("API", crate::github::API_BASE_URL)?,
            ip_filter_refresh: None,
        })
    }
}

fn parse_url(what: &str, value: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| StarQueryError::Config(format!("Invalid {} URL {}: {}", what, value, e)))
}
