//! # Substats Server
//!
//! Dashboard action endpoints and the weekly report trigger.

pub mod auth;
pub mod config;
pub mod routes;
pub mod scheduler;

use anyhow::Result;
use config::ServerConfig;
use prometheus::Registry;
use std::sync::Arc;
use std::time::Duration;
use substats_common::Clock;
use substats_engine::{
    Aggregator, AnalyticsService, CacheStore, EngineMetrics, InMemoryCache, LogMailer, Mailer,
    RedisCache, RelayMailer, StripeClient,
};
use tracing::{info, warn};

pub use auth::NonceVerifier;
pub use routes::{router, AppState};

/// Assemble the service and handler state from configuration
pub async fn build_state(config: &ServerConfig) -> Result<AppState> {
    let registry = Registry::new();
    let metrics = Arc::new(EngineMetrics::new()?);
    metrics.register(&registry)?;

    let aggregator = match &config.stripe.secret_key {
        Some(key) => {
            let client = StripeClient::new(
                key.clone(),
                config.stripe.api_base.clone(),
                Duration::from_secs(config.stripe.timeout_secs),
            )?;
            Some(
                Aggregator::new(Arc::new(client))
                    .with_page_delay(Duration::from_millis(config.stripe.page_delay_ms))
                    .with_metrics(metrics.clone()),
            )
        }
        None => {
            warn!(
                "STRIPE_SECRET_KEY not set, analytics endpoints will report missing configuration"
            );
            None
        }
    };

    let store: Arc<dyn CacheStore> = match &config.cache.redis_url {
        Some(url) => {
            info!("Using Redis cache");
            Arc::new(RedisCache::new(url).await?)
        }
        None => {
            info!("Using in-memory cache");
            Arc::new(InMemoryCache::new())
        }
    };

    let mailer: Arc<dyn Mailer> = match &config.report.mail_relay_url {
        Some(url) => Arc::new(RelayMailer::new(url.clone(), Duration::from_secs(30))?),
        None => Arc::new(LogMailer),
    };

    let service = AnalyticsService::new(aggregator, store, mailer, config.service_config())
        .with_metrics(metrics);

    Ok(AppState {
        service: Arc::new(service),
        nonces: Arc::new(NonceVerifier::new(config.auth.nonce_secret.as_deref())),
        admin_token: config.auth.admin_token.as_deref().map(Arc::from),
        registry,
        clock: Clock::System,
    })
}
