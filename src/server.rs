//! HTTP surface.
//!
//! - `GET /:owner/:repo/user/:username` - 200 if starred, 404 if not
//! - `POST /webhook` - GitHub star and ping deliveries
//! - `GET /healthz`, `/livez`, `/readyz` - probes

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Instant;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::health::{health_check, liveness_check, readiness_check};
use crate::ip_filter::{ip_filter_middleware, IpFilter};
use crate::query::starred_by_user;
use crate::store::KvStore;
use crate::webhook::{webhook_handler, WebhookIngestor};

/// Shared handler state. The store is the only mutable resource behind it.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<dyn KvStore>,
    pub ingestor: WebhookIngestor,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Arc<Config>, store: Arc<dyn KvStore>) -> Self {
        let ingestor = WebhookIngestor::new(
            store.clone(),
            config.webhook_secret.clone(),
            config.entry_ttl_secs,
        );
        Self {
            config,
            store,
            ingestor,
            start_time: Instant::now(),
        }
    }
}

/// Builds the router. When `ip_filter` is set, only `/webhook` is guarded by it.
pub fn build_router(state: AppState, ip_filter: Option<Arc<IpFilter>>) -> Router {
    let mut webhook: Router<AppState> = Router::new().route("/webhook", post(webhook_handler));
    if let Some(filter) = ip_filter {
        webhook = webhook.route_layer(middleware::from_fn_with_state(filter, ip_filter_middleware));
    }

    Router::new()
        .route("/:owner/:repo/user/:username", get(starred_by_user))
        .route("/healthz", get(health_check))
        .route("/livez", get(liveness_check))
        .route("/readyz", get(readiness_check))
        .merge(webhook)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
