//! Prometheus instrumentation for remote calls and the cache layer

use prometheus::{IntCounterVec, Opts, Registry};

/// Engine counters
pub struct EngineMetrics {
    pub remote_requests: IntCounterVec,
    pub remote_failures: IntCounterVec,
    pub cache_hits: IntCounterVec,
    pub cache_misses: IntCounterVec,
    pub recomputations: IntCounterVec,
}

impl EngineMetrics {
    pub fn new() -> prometheus::Result<Self> {
        Ok(Self {
            remote_requests: IntCounterVec::new(
                Opts::new("substats_remote_requests_total", "Billing API list calls issued"),
                &["resource"],
            )?,
            remote_failures: IntCounterVec::new(
                Opts::new("substats_remote_failures_total", "Billing API calls that failed"),
                &["resource"],
            )?,
            cache_hits: IntCounterVec::new(
                Opts::new("substats_cache_hits_total", "Cache reads served from a live entry"),
                &["entry"],
            )?,
            cache_misses: IntCounterVec::new(
                Opts::new("substats_cache_misses_total", "Cache reads that found no live entry"),
                &["entry"],
            )?,
            recomputations: IntCounterVec::new(
                Opts::new("substats_recomputations_total", "Cached values recomputed"),
                &["entry"],
            )?,
        })
    }

    pub fn register(&self, registry: &Registry) -> prometheus::Result<()> {
        registry.register(Box::new(self.remote_requests.clone()))?;
        registry.register(Box::new(self.remote_failures.clone()))?;
        registry.register(Box::new(self.cache_hits.clone()))?;
        registry.register(Box::new(self.cache_misses.clone()))?;
        registry.register(Box::new(self.recomputations.clone()))?;
        Ok(())
    }
}
