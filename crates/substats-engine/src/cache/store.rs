//! Key/value store seam for cached values and settings

use async_trait::async_trait;
use std::time::Duration;
use substats_common::Result;

/// String key/value store with optional per-key expiry
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Live value for `key`, `None` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value`, replacing any previous value. `None` never expires.
    async fn set(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// Drop `key` if present
    async fn invalidate(&self, key: &str) -> Result<()>;
}
