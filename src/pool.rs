use deadpool::{managed, Runtime};
use redis::aio::MultiplexedConnection;
use std::time::Duration;

use crate::error::StoreError;

#[derive(Debug, Clone)]
pub struct RedisConnectionConfig {
    pub url: String,
}

#[derive(Debug)]
pub struct RedisConnectionManager {
    client: redis::Client,
}

impl RedisConnectionManager {
    pub fn new(config: RedisConnectionConfig) -> Result<Self, StoreError> {
        let client = redis::Client::open(config.url.as_str())?;
        Ok(Self { client })
    }
}

impl managed::Manager for RedisConnectionManager {
    type Type = MultiplexedConnection;
    type Error = StoreError;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let conn = self.client.get_multiplexed_async_connection().await?;
        Ok(conn)
    }

    async fn recycle(
        &self,
        conn: &mut Self::Type,
        _: &managed::Metrics,
    ) -> managed::RecycleResult<Self::Error> {
        // A connection that cannot answer PING is dropped and replaced
        let pong: Result<String, redis::RedisError> =
            redis::cmd("PING").query_async(conn).await;
        match pong {
            Ok(_) => Ok(()),
            Err(e) => Err(managed::RecycleError::Backend(StoreError::Command(e))),
        }
    }
}

pub type RedisPool = managed::Pool<RedisConnectionManager>;

#[derive(Clone)]
pub struct PoolConfig {
    pub max_size: usize,
    pub connection_timeout: Duration,
    pub recycle_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: 16,
            connection_timeout: Duration::from_secs(5),
            recycle_timeout: Some(Duration::from_secs(5)),
        }
    }
}

pub fn create_pool(
    connection_config: RedisConnectionConfig,
    pool_config: PoolConfig,
) -> Result<RedisPool, StoreError> {
    let manager = RedisConnectionManager::new(connection_config)?;

    let mut builder = managed::Pool::builder(manager)
        .max_size(pool_config.max_size)
        .runtime(Runtime::Tokio1)
        .create_timeout(Some(pool_config.connection_timeout))
        .wait_timeout(Some(pool_config.connection_timeout));

    if let Some(recycle_timeout) = pool_config.recycle_timeout {
        builder = builder.recycle_timeout(Some(recycle_timeout));
    }

    builder
        .build()
        .map_err(|e| StoreError::Pool(format!("Failed to create connection pool: {}", e)))
}
