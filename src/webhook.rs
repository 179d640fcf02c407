//! GitHub webhook ingestion.
//!
//! Each delivery moves through `Received -> Validated -> Parsed -> Applied`
//! or is rejected. The signature is checked on the raw body before any
//! parsing happens.

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::error::StoreError;
use crate::models::{RepoRef, STARGAZER_SENTINEL};
use crate::server::AppState;
use crate::store::KvStore;
use crate::types::StarEventPayload;

type HmacSha256 = Hmac<Sha256>;

pub const HEADER_EVENT: &str = "x-github-event";
pub const HEADER_SIGNATURE: &str = "x-hub-signature-256";

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing required header: {0}")]
    MissingHeader(&'static str),

    #[error("invalid signature")]
    InvalidSignature,

    #[error("failed to parse request body: {0}")]
    InvalidPayload(String),

    #[error("unsupported event: {0}")]
    UnsupportedEvent(String),

    #[error("unsupported action: {0}")]
    UnsupportedAction(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

/// Parses a GitHub signature header (`sha256=<hex>`) into raw bytes.
pub fn parse_signature_header(header: &str) -> Option<Vec<u8>> {
    let hex_sig = header.strip_prefix("sha256=")?;
    hex::decode(hex_sig).ok()
}

/// Computes the HMAC-SHA256 of `payload` under `secret`.
pub fn compute_signature(payload: &[u8], secret: &[u8]) -> Vec<u8> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret).expect("HMAC can take key of any size");
    mac.update(payload);
    mac.finalize().into_bytes().to_vec()
}

/// Formats a signature as a header value, `sha256=<hex>`.
pub fn format_signature_header(signature: &[u8]) -> String {
    format!("sha256={}", hex::encode(signature))
}

/// Constant-time check of `signature_header` against the payload's HMAC.
pub fn verify_signature(payload: &[u8], signature_header: &str, secret: &[u8]) -> bool {
    let expected = match parse_signature_header(signature_header) {
        Some(sig) => sig,
        None => return false,
    };
    let mut mac = match <HmacSha256 as Mac>::new_from_slice(secret) {
        Ok(mac) => mac,
        Err(_) => return false,
    };
    mac.update(payload);
    mac.verify_slice(&expected).is_ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StarAction {
    Created,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StarEvent {
    pub action: StarAction,
    pub repo: RepoRef,
    pub login: String,
}

/// What an accepted delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Pong,
    Applied(StarEvent),
}

/// Extracts the JSON document from a delivery body. GitHub can be configured
/// to send it form-encoded in a `payload` field.
fn json_body(content_type: Option<&str>, body: &[u8]) -> Result<Vec<u8>, WebhookError> {
    let is_form = content_type
        .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false);
    if !is_form {
        return Ok(body.to_vec());
    }
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "payload")
        .map(|(_, value)| value.into_owned().into_bytes())
        .ok_or_else(|| WebhookError::InvalidPayload("missing payload form field".to_string()))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parses a `star` event payload.
pub fn parse_star_event(payload: &[u8]) -> Result<StarEvent, WebhookError> {
    let event: StarEventPayload =
        serde_json::from_slice(payload).map_err(|e| WebhookError::InvalidPayload(e.to_string()))?;

    let repository = event.repository.ok_or(WebhookError::MissingField("repository"))?;
    let owner = non_empty(repository.owner.and_then(|o| o.login))
        .ok_or(WebhookError::MissingField("owner"))?;
    let name = non_empty(repository.name).ok_or(WebhookError::MissingField("name"))?;

    let action = match event.action.as_deref() {
        Some("created") => StarAction::Created,
        Some("deleted") => StarAction::Deleted,
        Some(other) => return Err(WebhookError::UnsupportedAction(other.to_string())),
        None => return Err(WebhookError::MissingField("action")),
    };

    let login = non_empty(event.sender.and_then(|s| s.login))
        .ok_or(WebhookError::MissingField("sender"))?;

    Ok(StarEvent {
        action,
        repo: RepoRef::new(owner, name),
        login,
    })
}

/// Validates and applies single webhook deliveries to the store.
#[derive(Clone)]
pub struct WebhookIngestor {
    store: Arc<dyn KvStore>,
    secret: Arc<[u8]>,
    ttl_seconds: u64,
}

impl WebhookIngestor {
    pub fn new(store: Arc<dyn KvStore>, secret: impl Into<Arc<[u8]>>, ttl_seconds: u64) -> Self {
        Self {
            store,
            secret: secret.into(),
            ttl_seconds,
        }
    }

    pub async fn ingest(
        &self,
        event_type: Option<&str>,
        signature: Option<&str>,
        content_type: Option<&str>,
        body: &[u8],
    ) -> Result<WebhookOutcome, WebhookError> {
        let signature = signature.ok_or(WebhookError::MissingHeader(HEADER_SIGNATURE))?;
        if !verify_signature(body, signature, &self.secret) {
            return Err(WebhookError::InvalidSignature);
        }

        let event_type = event_type.ok_or(WebhookError::MissingHeader(HEADER_EVENT))?;
        let event = match event_type {
            "ping" => return Ok(WebhookOutcome::Pong),
            "star" => parse_star_event(&json_body(content_type, body)?)?,
            other => return Err(WebhookError::UnsupportedEvent(other.to_string())),
        };

        self.apply(&event).await?;
        Ok(WebhookOutcome::Applied(event))
    }

    async fn apply(&self, event: &StarEvent) -> Result<(), StoreError> {
        let key = event.repo.key(&event.login);
        match event.action {
            StarAction::Created => {
                info!(repo = %event.repo, user = %event.login, "Star added");
                self.store
                    .set_with_expiry(self.ttl_seconds, &[(key, STARGAZER_SENTINEL.to_string())])
                    .await
            }
            StarAction::Deleted => {
                info!(repo = %event.repo, user = %event.login, "Star removed");
                self.store.delete(&key).await
            }
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: impl header::AsHeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

/// `POST /webhook`
pub async fn webhook_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, &'static str), WebhookError> {
    let result = state
        .ingestor
        .ingest(
            header_str(&headers, HEADER_EVENT),
            header_str(&headers, HEADER_SIGNATURE),
            header_str(&headers, header::CONTENT_TYPE),
            &body,
        )
        .await;

    match result {
        Ok(WebhookOutcome::Pong) => {
            debug!("Webhook ping received");
            Ok((StatusCode::OK, "OK"))
        }
        Ok(WebhookOutcome::Applied(_)) => Ok((StatusCode::OK, "OK")),
        Err(WebhookError::Store(e)) => {
            error!(error = %e, "Failed to update stargazer data");
            Err(WebhookError::Store(e))
        }
        Err(e) => {
            warn!(error = %e, "Rejected webhook delivery");
            Err(e)
        }
    }
}
