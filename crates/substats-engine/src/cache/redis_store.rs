//! Redis cache store
//!
//! Stores cached snapshots and settings as JSON strings under a key prefix.
//! Expiry is delegated to Redis via `SETEX`.

use super::store::CacheStore;
use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::sync::Arc;
use std::time::Duration;
use substats_common::{AnalyticsError, Result};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

/// Redis-backed cache store
pub struct RedisCache {
    client: Client,
    connection: Arc<RwLock<Option<MultiplexedConnection>>>,
    prefix: String,
}

impl RedisCache {
    /// Connect to Redis
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| AnalyticsError::Config(format!("Failed to create Redis client: {}", e)))?;

        let connection = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AnalyticsError::Storage(format!("Failed to connect to Redis: {}", e)))?;

        Ok(Self {
            client,
            connection: Arc::new(RwLock::new(Some(connection))),
            prefix: "substats".to_string(),
        })
    }

    pub fn with_prefix(mut self, prefix: &str) -> Self {
        self.prefix = prefix.to_string();
        self
    }

    fn redis_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    async fn get_connection(&self) -> Result<MultiplexedConnection> {
        let guard = self.connection.read().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }
        drop(guard);

        let mut guard = self.connection.write().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let connection = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| AnalyticsError::Storage(format!("Failed to reconnect to Redis: {}", e)))?;

        *guard = Some(connection.clone());
        Ok(connection)
    }

    /// Forget the current connection so the next call reconnects
    async fn reset_connection(&self) {
        *self.connection.write().await = None;
    }

    async fn storage_error(&self, op: &str, err: redis::RedisError) -> AnalyticsError {
        warn!("Cache {} error: {}", op, err);
        if err.is_io_error() || err.is_connection_dropped() {
            self.reset_connection().await;
        }
        AnalyticsError::Storage(format!("Redis {} failed: {}", op, err))
    }
}

#[async_trait]
impl CacheStore for RedisCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let redis_key = self.redis_key(key);
        let mut conn = self.get_connection().await?;

        match conn.get::<_, Option<String>>(&redis_key).await {
            Ok(value) => {
                debug!(key = %redis_key, hit = value.is_some(), "Cache read");
                Ok(value)
            }
            Err(e) => Err(self.storage_error("get", e).await),
        }
    }

    #[instrument(skip(self, value))]
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let redis_key = self.redis_key(key);
        let mut conn = self.get_connection().await?;

        let result = match ttl {
            Some(ttl) => conn.set_ex::<_, _, ()>(&redis_key, value, ttl.as_secs().max(1)).await,
            None => conn.set::<_, _, ()>(&redis_key, value).await,
        };
        if let Err(e) = result {
            return Err(self.storage_error("set", e).await);
        }

        debug!(key = %redis_key, ttl_secs = ttl.map(|t| t.as_secs()), "Cached value");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn invalidate(&self, key: &str) -> Result<()> {
        let redis_key = self.redis_key(key);
        let mut conn = self.get_connection().await?;

        if let Err(e) = conn.del::<_, ()>(&redis_key).await {
            return Err(self.storage_error("del", e).await);
        }
        debug!(key = %redis_key, "Invalidated cache entry");
        Ok(())
    }
}
