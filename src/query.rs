use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use tracing::error;

use crate::error::StoreError;
use crate::models::RepoRef;
use crate::server::AppState;
use crate::store::KvStore;

#[derive(Debug)]
pub enum LookupResult {
    Found,
    NotFound,
    Error(StoreError),
}

/// Single point read for the (repo, username) relation.
pub async fn lookup(store: &dyn KvStore, repo: &RepoRef, username: &str) -> LookupResult {
    match store.get(&repo.key(username)).await {
        Ok(Some(value)) if !value.is_empty() => LookupResult::Found,
        Ok(_) => LookupResult::NotFound,
        Err(e) => LookupResult::Error(e),
    }
}

/// `GET /:owner/:repo/user/:username`
pub async fn starred_by_user(
    State(state): State<AppState>,
    Path((owner, name, username)): Path<(String, String, String)>,
) -> impl IntoResponse {
    let repo = RepoRef::new(owner, name);
    match lookup(state.store.as_ref(), &repo, &username).await {
        LookupResult::Found => (StatusCode::OK, "OK"),
        LookupResult::NotFound => (StatusCode::NOT_FOUND, "Not Found"),
        LookupResult::Error(e) => {
            error!(repo = %repo, user = %username, error = %e, "Failed to get stargazer data");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn lookup_reflects_key_presence() {
        let store = MemoryStore::new();
        let repo = RepoRef::new("coder", "coder");

        assert!(matches!(lookup(&store, &repo, "kylecarbs").await, LookupResult::NotFound));

        store
            .set_with_expiry(60, &[(repo.key("kylecarbs"), "true".to_string())])
            .await
            .unwrap();
        assert!(matches!(lookup(&store, &repo, "kylecarbs").await, LookupResult::Found));
    }

    #[tokio::test]
    async fn empty_value_reads_as_not_found() {
        let store = MemoryStore::new();
        let repo = RepoRef::new("coder", "coder");
        store
            .set_with_expiry(60, &[(repo.key("ghost"), String::new())])
            .await
            .unwrap();
        assert!(matches!(lookup(&store, &repo, "ghost").await, LookupResult::NotFound));
    }
}
