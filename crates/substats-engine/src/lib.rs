//! # Substats Engine
//!
//! Subscription analytics over a remote billing API.
//!
//! ## Flow
//!
//! ```text
//! BillingApi --pages--> Aggregator --MetricsSnapshot--> CachedEntry --> AnalyticsService
//!                                                                         |
//!                                                     Formatter --> Mailer
//! ```
//!
//! Every metric is computed by walking the remote list with a fixed delay
//! between pages. A failed walk makes only that metric unavailable.

pub mod aggregator;
pub mod billing;
pub mod cache;
pub mod format;
pub mod mail;
pub mod metrics;
pub mod service;
pub mod settings;

pub use aggregator::{Aggregator, DEFAULT_PAGE_DELAY};
pub use billing::{BillingApi, InMemoryBilling, StripeClient};
pub use cache::{CacheStore, CachedEntry, InMemoryCache, RedisCache};
pub use mail::{EmailMessage, LogMailer, Mailer, MemoryMailer, RelayMailer};
pub use metrics::EngineMetrics;
pub use service::{
    AnalyticsService, ServiceConfig, DEFAULT_CACHE_TTL, MISSING_API_KEY, NO_RECIPIENTS,
};
pub use settings::{parse_recipients, SettingsStore};
