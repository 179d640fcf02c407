use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

use crate::error::StoreError;
use crate::pool::{RedisConnectionManager, RedisPool};
use crate::store::{KvStore, MIN_TTL_SECS};

type PooledConnection = deadpool::managed::Object<RedisConnectionManager>;

/// Production store backed by Redis.
///
/// Each call checks a multiplexed connection out of the pool. Writes are sent
/// as a single pipeline; no client-side locking is layered on top.
#[derive(Clone)]
pub struct RedisStore {
    pool: Arc<RedisPool>,
}

impl RedisStore {
    pub fn new(pool: Arc<RedisPool>) -> Self {
        Self { pool }
    }

    async fn connection(&self) -> Result<PooledConnection, StoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to get connection from pool: {}", e)))
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn set_with_expiry(
        &self,
        ttl_seconds: u64,
        pairs: &[(String, String)],
    ) -> Result<(), StoreError> {
        if pairs.is_empty() {
            return Ok(());
        }

        let mut pipe = redis::pipe();
        for (key, value) in pairs {
            pipe.cmd("SET")
                .arg(key)
                .arg(value)
                .arg("EX")
                .arg(ttl_seconds.max(MIN_TTL_SECS))
                .ignore();
        }

        let mut conn = self.connection().await?;
        let _: () = pipe.query_async(&mut *conn).await?;
        debug!(count = pairs.len(), ttl_seconds, "Wrote keys to redis");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut *conn).await?;
        Ok(value)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        // DEL reports how many keys it removed; zero is fine.
        let _removed: i64 = redis::cmd("DEL").arg(key).query_async(&mut *conn).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.connection().await?;
        let _: String = redis::cmd("PING").query_async(&mut *conn).await?;
        Ok(())
    }
}
