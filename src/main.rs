use clap::Parser;
use colored::*;
use starquery::cli::Cli;
use starquery::error::{Result, StarQueryError};
use starquery::github::GitHubClient;
use starquery::ip_filter::IpFilter;
use starquery::pool::{create_pool, PoolConfig, RedisConnectionConfig};
use starquery::redis_store::RedisStore;
use starquery::store::{KvStore, MemoryStore};
use starquery::{Config, StarQuery};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("starquery=info,starquery_server=info,tower_http=info")
        }))
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!(error = %e, "StarQuery exited with error");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Arc::new(Config::from_cli(cli)?);

    println!("{}", "StarQuery Server".bold().green());
    println!("{}\n", "=".repeat(50).dimmed());

    if config.github_token.is_none() {
        warn!("Missing GITHUB_TOKEN, unauthenticated requests will be rate-limited");
    }

    let store: Arc<dyn KvStore> = match &config.redis_url {
        Some(url) => {
            let pool = create_pool(
                RedisConnectionConfig { url: url.clone() },
                PoolConfig {
                    max_size: config.redis_pool_size,
                    ..Default::default()
                },
            )?;
            println!("✅ Created Redis connection pool with {} connections", config.redis_pool_size);
            Arc::new(RedisStore::new(Arc::new(pool)))
        }
        None => {
            warn!("Missing REDIS_URL, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    let github = Arc::new(GitHubClient::with_endpoints(
        config.github_token.clone(),
        config.graphql_url.clone(),
        config.api_url.clone(),
    )?);

    let ip_filter = config.ip_filter_refresh.map(|refresh| {
        println!("🔒 Restricting webhooks to GitHub hook networks");
        Arc::new(IpFilter::new(github.clone(), refresh))
    });

    let tracked: Vec<String> = config.repos.iter().map(|r| r.to_string()).collect();
    println!("📊 Tracking {} repositories: {}", tracked.len(), tracked.join(", "));

    let service = StarQuery::start(config.clone(), store, github, ip_filter);
    let app = service.router();

    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;
    info!("Listening on http://{}", config.bind_address);
    println!("\nPress Ctrl+C to stop the server\n");

    let shutdown = service.cancellation_token();
    let served = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await;

    println!("\n🛑 Shutting down server...");
    service.shutdown().await;
    println!("✅ Server stopped");

    served.map_err(StarQueryError::from)
}

/// Resolves on Ctrl+C, cancelling background work, or when the token is
/// cancelled elsewhere.
async fn shutdown_signal(cancel: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for shutdown signal");
            }
        }
        _ = cancel.cancelled() => {}
    }
    cancel.cancel();
}
