use clap::Parser;

use crate::models::RepoRef;

#[derive(Parser, Debug)]
#[command(name = "starquery-server")]
#[command(about = "StarQuery - answers whether a GitHub user has starred a tracked repository")]
#[command(version)]
pub struct Cli {
    /// Address the HTTP server binds to
    #[arg(long, env = "BIND_ADDRESS", default_value = "127.0.0.1:8080")]
    pub bind_address: String,

    /// GitHub token used for GraphQL and meta requests
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Redis URL. Without it an in-memory store is used
    #[arg(long, env = "REDIS_URL")]
    pub redis_url: Option<String>,

    /// Maximum pooled Redis connections
    #[arg(long, env = "REDIS_POOL_SIZE", default_value_t = 16)]
    pub redis_pool_size: usize,

    /// Shared secret for webhook signatures
    #[arg(long, env = "WEBHOOK_SECRET", hide_env_values = true)]
    pub webhook_secret: Option<String>,

    /// Tracked repositories as owner/name (repeatable or comma separated)
    #[arg(
        long = "repo",
        env = "STARQUERY_REPOS",
        value_delimiter = ',',
        default_value = "coder/coder"
    )]
    pub repos: Vec<RepoRef>,

    /// Seconds between full stargazer sweeps
    #[arg(long, env = "SWEEP_INTERVAL_SECS", default_value_t = 900)]
    pub sweep_interval_secs: u64,

    /// GitHub GraphQL endpoint
    #[arg(long, env = "GITHUB_GRAPHQL_URL", default_value = crate::github::GRAPHQL_URL)]
    pub graphql_url: String,

    /// GitHub REST API base URL
    #[arg(long, env = "GITHUB_API_URL", default_value = crate::github::API_BASE_URL)]
    pub api_url: String,

    /// Only accept webhooks from GitHub's published hook networks
    #[arg(long, env = "IP_FILTER")]
    pub ip_filter: bool,

    /// Seconds between hook network refreshes
    #[arg(long, env = "IP_FILTER_REFRESH_SECS", default_value_t = 3600)]
    pub ip_filter_refresh_secs: u64,
}
