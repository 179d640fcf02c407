use crate::server::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub tracked_repos: usize,
    pub store: CheckResult,
}

/// Result of an individual check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Liveness probe response (minimal, just indicates the process is running)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    pub status: String,
}

/// Readiness probe response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

const STORE_CHECK_TIMEOUT: Duration = Duration::from_secs(2);

async fn check_store(state: &AppState) -> CheckResult {
    match tokio::time::timeout(STORE_CHECK_TIMEOUT, state.store.ping()).await {
        Ok(Ok(())) => CheckResult {
            status: HealthStatus::Healthy,
            message: None,
        },
        Ok(Err(e)) => {
            warn!(error = %e, "Store health check failed");
            CheckResult {
                status: HealthStatus::Unhealthy,
                message: Some(format!("Store ping failed: {}", e)),
            }
        }
        Err(_) => CheckResult {
            status: HealthStatus::Unhealthy,
            message: Some("Store ping timed out".to_string()),
        },
    }
}

/// Main health check endpoint
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = check_store(&state).await;
    let status_code = match store.status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    let response = HealthResponse {
        status: store.status.clone(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        tracked_repos: state.config.repos.len(),
        store,
    };

    (status_code, Json(response))
}

/// Kubernetes liveness probe - just checks if the process is alive
pub async fn liveness_check() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(LivenessResponse {
            status: "alive".to_string(),
        }),
    )
}

/// Kubernetes readiness probe - ready once the store answers
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let store = check_store(&state).await;
    let ready = store.status == HealthStatus::Healthy;

    let status_code = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status_code,
        Json(ReadinessResponse {
            ready,
            message: store.message,
        }),
    )
}
