//! Typed cache entries with compute-on-miss
//!
//! A [`CachedEntry`] owns one key in a [`CacheStore`] and stores a whole
//! value as JSON, so readers always see a complete value. Concurrent misses
//! may both recompute; the last write wins.

use super::store::CacheStore;
use crate::metrics::EngineMetrics;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;
use substats_common::Result;
use tracing::{debug, warn};

/// One typed value in a cache store
pub struct CachedEntry<T> {
    store: Arc<dyn CacheStore>,
    key: String,
    ttl: Duration,
    metrics: Option<Arc<EngineMetrics>>,
    _value: PhantomData<fn() -> T>,
}

impl<T> CachedEntry<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(store: Arc<dyn CacheStore>, key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            key: key.into(),
            ttl,
            metrics: None,
            _value: PhantomData,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached value, `None` when absent or expired
    pub async fn get(&self) -> Result<Option<T>> {
        match self.store.get(&self.key).await? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Replace the cached value
    pub async fn set(&self, value: &T, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.store.set(&self.key, json, Some(ttl)).await
    }

    pub async fn invalidate(&self) -> Result<()> {
        self.store.invalidate(&self.key).await
    }

    /// Cached value, or a freshly computed one when `force` is set or
    /// nothing live is cached.
    ///
    /// Cache read and write failures are logged and do not fail the call.
    /// A failed computation leaves the cached value untouched.
    pub async fn fetch_or_compute<F, Fut>(&self, force: bool, compute: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !force {
            match self.get().await {
                Ok(Some(value)) => {
                    self.count(|m| &m.cache_hits);
                    debug!(key = %self.key, "Cache hit");
                    return Ok(value);
                }
                Ok(None) => {
                    self.count(|m| &m.cache_misses);
                    debug!(key = %self.key, "Cache miss");
                }
                Err(e) => {
                    self.count(|m| &m.cache_misses);
                    warn!(key = %self.key, error = %e, "Cache read failed, recomputing");
                }
            }
        }

        let value = compute().await?;
        self.count(|m| &m.recomputations);

        if let Err(e) = self.set(&value, self.ttl).await {
            warn!(key = %self.key, error = %e, "Cache write failed");
        }
        Ok(value)
    }

    fn count(&self, counter: impl Fn(&EngineMetrics) -> &prometheus::IntCounterVec) {
        if let Some(metrics) = &self.metrics {
            counter(metrics).with_label_values(&[self.key.as_str()]).inc();
        }
    }
}
