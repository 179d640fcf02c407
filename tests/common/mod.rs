#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use starquery::error::{FetchError, StoreError};
use starquery::github::{StargazerPage, StargazerSource};
use starquery::models::{RateLimitState, RepoRef, StargazerFact};
use starquery::pool::{create_pool, PoolConfig, RedisConnectionConfig, RedisPool};
use starquery::redis_store::RedisStore;
use starquery::store::KvStore;
use starquery::webhook::{compute_signature, format_signature_header};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::Instant;
use url::Url;

/// A scripted page response keyed by (repo, cursor).
#[derive(Clone)]
pub enum Scripted {
    Page(Vec<&'static str>, RateLimitState),
    Fail,
}

#[derive(Debug, Clone)]
pub struct FetchCall {
    pub repo: RepoRef,
    pub cursor: String,
    pub at: Instant,
}

/// Stargazer source that replays scripted pages. Cursors are `"{login}-cursor"`.
#[derive(Default)]
pub struct ScriptedSource {
    pages: Mutex<HashMap<(RepoRef, String), Scripted>>,
    calls: Mutex<Vec<FetchCall>>,
}

pub fn plenty() -> RateLimitState {
    RateLimitState {
        remaining: 5000,
        reset_at: None,
    }
}

pub fn cursor_for(login: &str) -> String {
    format!("{}-cursor", login)
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(self, repo: &RepoRef, cursor: &str, response: Scripted) -> Self {
        self.pages
            .lock()
            .unwrap()
            .insert((repo.clone(), cursor.to_string()), response);
        self
    }

    pub fn calls(&self) -> Vec<FetchCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl StargazerSource for ScriptedSource {
    async fn fetch_page(&self, repo: &RepoRef, cursor: &str) -> Result<StargazerPage, FetchError> {
        self.calls.lock().unwrap().push(FetchCall {
            repo: repo.clone(),
            cursor: cursor.to_string(),
            at: Instant::now(),
        });

        let scripted = self
            .pages
            .lock()
            .unwrap()
            .get(&(repo.clone(), cursor.to_string()))
            .cloned();

        match scripted {
            Some(Scripted::Page(logins, rate_limit)) => Ok(StargazerPage {
                facts: logins
                    .into_iter()
                    .map(|login| StargazerFact {
                        login: login.to_string(),
                        cursor: cursor_for(login),
                    })
                    .collect(),
                rate_limit,
            }),
            Some(Scripted::Fail) => Err(FetchError::Status {
                status: 502,
                body: "bad gateway".to_string(),
            }),
            // Unscripted cursors are the end of the list
            None => Ok(StargazerPage {
                facts: Vec::new(),
                rate_limit: plenty(),
            }),
        }
    }
}

/// Builds a `POST /webhook` request signed with `secret`.
pub fn signed_webhook(secret: &[u8], event_type: &str, body: &serde_json::Value) -> Request<Body> {
    let body_bytes = serde_json::to_vec(body).unwrap();
    let signature = format_signature_header(&compute_signature(&body_bytes, secret));

    Request::builder()
        .method("POST")
        .uri("/webhook")
        .header("content-type", "application/json")
        .header("x-github-event", event_type)
        .header("x-hub-signature-256", signature)
        .body(Body::from(body_bytes))
        .unwrap()
}

pub fn star_event(repo: &RepoRef, login: &str, action: &str) -> serde_json::Value {
    serde_json::json!({
        "action": action,
        "starred_at": null,
        "repository": {
            "name": repo.name,
            "full_name": repo.to_string(),
            "owner": {"login": repo.owner}
        },
        "sender": {"login": login}
    })
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Requests received by a fake GitHub server.
#[derive(Clone, Default)]
pub struct Captured {
    pub bodies: Arc<Mutex<Vec<serde_json::Value>>>,
    pub authorization: Arc<Mutex<Vec<Option<String>>>>,
}

/// Serves canned GraphQL and meta responses on an ephemeral local port.
/// Returns the base URL; GraphQL lives at `/graphql`, meta at `/meta`.
pub async fn spawn_fake_github(
    graphql_status: StatusCode,
    graphql_body: &'static str,
    meta_body: &'static str,
) -> (Url, Captured) {
    let captured = Captured::default();
    let graphql_captured = captured.clone();

    let app = Router::new()
        .route(
            "/graphql",
            post(move |headers: HeaderMap, body: axum::body::Bytes| {
                let captured = graphql_captured.clone();
                async move {
                    if let Ok(json) = serde_json::from_slice(&body) {
                        captured.bodies.lock().unwrap().push(json);
                    }
                    captured.authorization.lock().unwrap().push(
                        headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(|s| s.to_string()),
                    );
                    (graphql_status, graphql_body)
                }
            }),
        )
        .route("/meta", get(move || async move { meta_body }));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (Url::parse(&format!("http://{}/", addr)).unwrap(), captured)
}

/// Live Redis store for integration tests, connected through `REDIS_URL`.
pub struct RedisTestContext {
    pub pool: Arc<RedisPool>,
    pub store: RedisStore,
}

impl RedisTestContext {
    pub async fn new() -> Result<Self, StoreError> {
        let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let pool = Arc::new(create_pool(
            RedisConnectionConfig { url: url.clone() },
            PoolConfig {
                max_size: 4,
                ..Default::default()
            },
        )?);
        let store = RedisStore::new(pool.clone());

        match tokio::time::timeout(std::time::Duration::from_secs(5), store.ping()).await {
            Ok(Ok(())) => Ok(Self { pool, store }),
            Ok(Err(e)) => {
                eprintln!("Failed to reach Redis at {}: {}", url, e);
                eprintln!("Example: docker run --rm -p 6379:6379 redis:7");
                Err(e)
            }
            Err(_) => Err(StoreError::Pool(format!("Connection to Redis at {} timed out", url))),
        }
    }

    /// Key unique to this test run, so parallel tests never collide.
    pub fn key(&self, name: &str) -> String {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!("starquery-test:{}:{}", nanos, name)
    }

    /// Remaining TTL of `key` as reported by Redis (`-2` when absent).
    pub async fn ttl(&self, key: &str) -> i64 {
        let mut conn = self.pool.get().await.unwrap();
        redis::cmd("TTL").arg(key).query_async(&mut *conn).await.unwrap()
    }
}
