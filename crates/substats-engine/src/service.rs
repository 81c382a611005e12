//! Request-handler operations
//!
//! [`AnalyticsService`] ties the aggregator, cache entries, settings and
//! mailer together behind the operations the dashboard and the weekly
//! trigger invoke. Missing configuration is reported before any remote call.

use crate::aggregator::Aggregator;
use crate::cache::{CacheStore, CachedEntry, STATS_KEY, SUBSCRIBERS_KEY};
use crate::format::{format_email_body, ReportContext, ReportKind, TopCustomers};
use crate::mail::{EmailMessage, Mailer};
use crate::metrics::EngineMetrics;
use crate::settings::SettingsStore;
use std::sync::Arc;
use std::time::Duration;
use substats_common::{
    AnalyticsError, Clock, MetricsSnapshot, Result, SubscriberRow, DEFAULT_TOP_CUSTOMERS,
    MAX_TOP_SUBSCRIBERS,
};
use tracing::{error, info, instrument, warn};

/// Shown when no billing API key is configured
pub const MISSING_API_KEY: &str =
    "Stripe Subscription Analytics: Please set STRIPE_SECRET_KEY to your Stripe secret key.";

/// Returned when a report is requested with nobody to send it to
pub const NO_RECIPIENTS: &str = "No recipients configured. Please save your email settings first.";

/// Default lifetime of both cache entries
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Report and cache settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub site_name: String,
    pub dashboard_url: String,
    pub mail_from: String,
    pub cache_ttl: Duration,
    /// Recipients used until an admin saves a list
    pub default_recipients: Vec<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            site_name: "Subscription Analytics".to_string(),
            dashboard_url: "http://localhost:8086/dashboard".to_string(),
            mail_from: "analytics@localhost".to_string(),
            cache_ttl: DEFAULT_CACHE_TTL,
            default_recipients: Vec::new(),
        }
    }
}

/// Subscription analytics operations
pub struct AnalyticsService {
    aggregator: Option<Arc<Aggregator>>,
    stats: CachedEntry<MetricsSnapshot>,
    subscribers: CachedEntry<Vec<SubscriberRow>>,
    settings: SettingsStore,
    mailer: Arc<dyn Mailer>,
    config: ServiceConfig,
    clock: Clock,
}

impl AnalyticsService {
    /// `aggregator` is `None` when no API key is configured
    pub fn new(
        aggregator: Option<Aggregator>,
        store: Arc<dyn CacheStore>,
        mailer: Arc<dyn Mailer>,
        config: ServiceConfig,
    ) -> Self {
        Self {
            aggregator: aggregator.map(Arc::new),
            stats: CachedEntry::new(store.clone(), STATS_KEY, config.cache_ttl),
            subscribers: CachedEntry::new(store.clone(), SUBSCRIBERS_KEY, config.cache_ttl),
            settings: SettingsStore::new(store, config.default_recipients.clone()),
            mailer,
            config,
            clock: Clock::System,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.stats = self.stats.with_metrics(metrics.clone());
        self.subscribers = self.subscribers.with_metrics(metrics);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    fn aggregator(&self) -> Result<&Aggregator> {
        self.aggregator
            .as_deref()
            .ok_or_else(|| AnalyticsError::NotConfigured(MISSING_API_KEY.to_string()))
    }

    /// User-visible configuration warnings
    pub fn notices(&self) -> Vec<String> {
        let mut notices = Vec::new();
        if self.aggregator.is_none() {
            notices.push(MISSING_API_KEY.to_string());
        }
        notices
    }

    /// Current metrics, recomputed on miss, expiry or `force_refresh`
    #[instrument(skip(self))]
    pub async fn get_dashboard_stats(&self, force_refresh: bool) -> Result<MetricsSnapshot> {
        let aggregator = self.aggregator()?;
        self.stats
            .fetch_or_compute(force_refresh, || async { Ok(aggregator.snapshot().await) })
            .await
    }

    /// Top-subscriber table, recomputed on miss, expiry or `force_refresh`
    #[instrument(skip(self))]
    pub async fn get_subscriber_table(&self, force_refresh: bool) -> Result<Vec<SubscriberRow>> {
        let aggregator = self.aggregator()?;
        self.subscribers
            .fetch_or_compute(force_refresh, || aggregator.top_subscribers(MAX_TOP_SUBSCRIBERS))
            .await
    }

    /// Send the test report to the configured recipients.
    ///
    /// Uses the cached snapshot when one is live. Returns the recipients.
    #[instrument(skip(self))]
    pub async fn send_test_report(&self) -> Result<Vec<String>> {
        let aggregator = self.aggregator()?;
        let recipients = self.settings.recipients().await?;
        if recipients.is_empty() {
            return Err(AnalyticsError::NotConfigured(NO_RECIPIENTS.to_string()));
        }

        let snapshot = self
            .stats
            .fetch_or_compute(false, || async { Ok(aggregator.snapshot().await) })
            .await?;

        let body = format_email_body(
            &snapshot,
            &ReportContext {
                kind: ReportKind::Test,
                generated_at: self.clock.now(),
                dashboard_url: &self.config.dashboard_url,
                top_customers: TopCustomers::Omitted,
            },
        );
        self.deliver(ReportKind::Test, recipients.clone(), body).await?;

        info!(recipients = ?recipients, "Test report sent");
        Ok(recipients)
    }

    /// One lightweight remote call
    #[instrument(skip(self))]
    pub async fn test_connectivity(&self) -> Result<()> {
        self.aggregator()?.api().retrieve_balance().await
    }

    pub async fn check_connectivity(&self) -> bool {
        match self.test_connectivity().await {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Connectivity check failed");
                false
            }
        }
    }

    /// Recompute everything and mail the weekly report.
    ///
    /// Does nothing when no recipients are configured.
    #[instrument(skip(self))]
    pub async fn weekly_report_job(&self) -> Result<()> {
        let recipients = self.settings.recipients().await?;
        if recipients.is_empty() {
            info!("No report recipients configured, skipping weekly report");
            return Ok(());
        }
        let aggregator = self.aggregator()?;

        let snapshot = aggregator.snapshot().await;
        let top_customers = aggregator.top_customers_by_value(DEFAULT_TOP_CUSTOMERS).await;
        let top_section = match &top_customers {
            Ok(customers) => TopCustomers::Listed(customers),
            Err(e) => {
                warn!(error = %e, "Top customers unavailable");
                TopCustomers::Unavailable
            }
        };

        let body = format_email_body(
            &snapshot,
            &ReportContext {
                kind: ReportKind::Weekly,
                generated_at: self.clock.now(),
                dashboard_url: &self.config.dashboard_url,
                top_customers: top_section,
            },
        );

        if let Err(e) = self.deliver(ReportKind::Weekly, recipients.clone(), body).await {
            error!(error = %e, "Weekly report delivery failed");
            return Err(e);
        }
        info!(recipients = recipients.len(), "Weekly report sent");
        Ok(())
    }

    async fn deliver(&self, kind: ReportKind, recipients: Vec<String>, body: String) -> Result<()> {
        let subject = kind.subject(&self.config.site_name);
        let message = EmailMessage::plain_text(recipients, subject, body).from(
            format!("{} Analytics", self.config.site_name),
            self.config.mail_from.clone(),
        );
        self.mailer.send(&message).await
    }

    pub async fn recipients(&self) -> Result<Vec<String>> {
        self.settings.recipients().await
    }

    pub async fn update_recipients(&self, raw: &str) -> Result<Vec<String>> {
        self.settings.update_recipients(raw).await
    }

    pub async fn card_order(&self, user: &str) -> Result<Vec<String>> {
        self.settings.card_order(user).await
    }

    pub async fn save_card_order(&self, user: &str, order: &[String]) -> Result<()> {
        self.settings.save_card_order(user, order).await
    }
}
