//! Key-value storage for stargazer facts.
//!
//! Both ingestion paths write through [`KvStore`], so the store's
//! last-writer-wins behaviour under a shared key is what reconciles them.

use async_trait::async_trait;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::error::StoreError;

/// Shortest expiry a store will apply. Redis rejects `EX 0`.
pub const MIN_TTL_SECS: u64 = 1;

#[async_trait]
pub trait KvStore: Send + Sync {
    /// Writes every pair, resetting each key's expiry to `ttl_seconds` from now.
    /// A TTL below [`MIN_TTL_SECS`] is raised to it. An empty `pairs` slice is
    /// a no-op.
    async fn set_with_expiry(
        &self,
        ttl_seconds: u64,
        pairs: &[(String, String)],
    ) -> Result<(), StoreError>;

    /// Returns the stored value. Missing and expired keys both read as `None`.
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Removes the key. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Connectivity check used by readiness probes.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    /// Reclaims space held by expired entries and returns how many were
    /// dropped. Stores that expire keys on their own leave this as a no-op.
    async fn purge_expired(&self) -> Result<usize, StoreError> {
        Ok(0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process store for tests and local development.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live, unexpired entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.data
            .read()
            .await
            .values()
            .filter(|entry| entry.expires_at > now)
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Entries held in memory, expired or not.
    pub async fn stored_entries(&self) -> usize {
        self.data.read().await.len()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn set_with_expiry(
        &self,
        ttl_seconds: u64,
        pairs: &[(String, String)],
    ) -> Result<(), StoreError> {
        if pairs.is_empty() {
            return Ok(());
        }
        let expires_at = Instant::now() + Duration::from_secs(ttl_seconds.max(MIN_TTL_SECS));
        let mut data = self.data.write().await;
        for (key, value) in pairs {
            data.insert(
                key.clone(),
                Entry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let data = self.data.read().await;
        Ok(data
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.data.write().await.remove(key);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize, StoreError> {
        let now = Instant::now();
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|_, entry| entry.expires_at > now);
        Ok(before - data.len())
    }
}
