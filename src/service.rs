use axum::Router;
use futures::future::join_all;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::Config;
use crate::github::StargazerSource;
use crate::ip_filter::IpFilter;
use crate::server::{build_router, AppState};
use crate::store::KvStore;
use crate::sync::SyncLoop;

/// Running instance: background sync (and optional IP filter refresh) plus
/// the HTTP router that serves queries and webhooks.
pub struct StarQuery {
    state: AppState,
    ip_filter: Option<Arc<IpFilter>>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl StarQuery {
    /// Spawns the background tasks. Must be called within a Tokio runtime.
    pub fn start(
        config: Arc<Config>,
        store: Arc<dyn KvStore>,
        source: Arc<dyn StargazerSource>,
        ip_filter: Option<Arc<IpFilter>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        let sync_loop = SyncLoop::new(
            source,
            store.clone(),
            config.repos.clone(),
            config.sweep_interval,
            config.entry_ttl_secs,
        );
        tasks.push(tokio::spawn(sync_loop.run(cancel.child_token())));

        if let Some(filter) = &ip_filter {
            tasks.push(tokio::spawn(filter.clone().run(cancel.child_token())));
        }

        info!(repos = config.repos.len(), "StarQuery started");

        Self {
            state: AppState::new(config, store),
            ip_filter,
            cancel,
            tasks,
        }
    }

    pub fn router(&self) -> Router {
        build_router(self.state.clone(), self.ip_filter.clone())
    }

    /// Token that stops every background task when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Cancels background work and waits for every spawned task to exit.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        for result in join_all(self.tasks).await {
            if let Err(e) = result {
                error!(error = %e, "Background task ended abnormally");
            }
        }
        info!("StarQuery stopped");
    }
}
