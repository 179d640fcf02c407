//! Periodic full re-scan of every tracked repository's stargazers.
//!
//! The sweep never deletes: a user missing from the upstream list keeps their
//! entry until its TTL runs out. Each pass re-asserts every current
//! stargazer, so live stars never expire while the sweep keeps succeeding.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::github::StargazerSource;
use crate::models::{RepoRef, STARGAZER_SENTINEL};
use crate::store::KvStore;

/// Result of sweeping one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SweepOutcome {
    Completed { pages: usize, stargazers: usize },
    Cancelled,
}

pub struct SyncLoop {
    source: Arc<dyn StargazerSource>,
    store: Arc<dyn KvStore>,
    repos: Vec<RepoRef>,
    sweep_interval: Duration,
    ttl_seconds: u64,
}

impl SyncLoop {
    pub fn new(
        source: Arc<dyn StargazerSource>,
        store: Arc<dyn KvStore>,
        repos: Vec<RepoRef>,
        sweep_interval: Duration,
        ttl_seconds: u64,
    ) -> Self {
        Self {
            source,
            store,
            repos,
            sweep_interval,
            ttl_seconds,
        }
    }

    /// Sweeps every repository, then again each `sweep_interval`, until cancelled.
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval(self.sweep_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.sweep(&cancel).await {
                break;
            }
        }

        info!("Sync loop stopped");
    }

    /// One pass over all tracked repositories, in order, followed by a purge
    /// of expired entries. Returns `false` if cancellation interrupted the pass.
    pub async fn sweep(&self, cancel: &CancellationToken) -> bool {
        for repo in &self.repos {
            if cancel.is_cancelled() {
                return false;
            }
            match self.sweep_repo(repo, cancel).await {
                Ok(SweepOutcome::Completed { pages, stargazers }) => {
                    info!(repo = %repo, pages, stargazers, "Completed stargazer sweep");
                }
                Ok(SweepOutcome::Cancelled) => return false,
                Err(e) => {
                    // Retried on the next scheduled sweep
                    error!(repo = %repo, error = %e, "Failed to sync stargazers");
                }
            }
        }

        match self.store.purge_expired().await {
            Ok(0) => {}
            Ok(purged) => debug!(purged, "Purged expired entries"),
            Err(e) => warn!(error = %e, "Failed to purge expired entries"),
        }
        true
    }

    /// Walks one repository's pages until an empty page, writing each page
    /// before fetching the next.
    pub async fn sweep_repo(&self, repo: &RepoRef, cancel: &CancellationToken) -> Result<SweepOutcome> {
        let mut cursor = String::new();
        let mut pages = 0;
        let mut stargazers = 0;

        loop {
            debug!(repo = %repo, cursor = %cursor, "Fetching stargazers");
            let page = tokio::select! {
                _ = cancel.cancelled() => return Ok(SweepOutcome::Cancelled),
                page = self.source.fetch_page(repo, &cursor) => page?,
            };
            pages += 1;

            if !page.facts.is_empty() {
                let pairs: Vec<(String, String)> = page
                    .facts
                    .iter()
                    .map(|fact| (repo.key(&fact.login), STARGAZER_SENTINEL.to_string()))
                    .collect();
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(SweepOutcome::Cancelled),
                    written = self.store.set_with_expiry(self.ttl_seconds, &pairs) => written?,
                }
                stargazers += pairs.len();

                info!(
                    repo = %repo,
                    count = pairs.len(),
                    rate_limit_remaining = page.rate_limit.remaining,
                    "Stored stargazers"
                );
            }

            if let Some(wait) = page.rate_limit.exhausted_wait(Utc::now()) {
                warn!(repo = %repo, wait = ?wait, "Rate limit reached, pausing pagination");
                tokio::select! {
                    _ = cancel.cancelled() => return Ok(SweepOutcome::Cancelled),
                    _ = sleep(wait) => {}
                }
            }

            match page.facts.last() {
                Some(last) => cursor = last.cursor.clone(),
                None => return Ok(SweepOutcome::Completed { pages, stargazers }),
            }
        }
    }
}
