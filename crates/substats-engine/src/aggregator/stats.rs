//! Subscription metric aggregation
//!
//! Each operation walks the remote subscription list with its own filter and
//! reduces the records into one metric. A failed page aborts the metric; the
//! snapshot builder then marks just that metric unavailable.

use super::dropoff::most_common_period;
use super::pager::Pager;
use crate::billing::{BillingApi, PagedQuery, SubscriptionQuery};
use crate::format::{format_dropoff_period, NO_DROPOFF_DATA};
use crate::metrics::EngineMetrics;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;
use substats_common::{
    retention_rate, Clock, MetricsSnapshot, Result, SubscriptionRecord, SubscriptionStatus,
    ORIGINAL_ACTIVE_DAYS, WEEK_DAYS,
};
use tracing::{info, instrument, warn};

/// Delay between consecutive page requests
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(50);

/// Page size for plain list walks
pub const PAGE_SIZE: u32 = 100;

/// Page size for walks that expand the customer object
pub const CUSTOMER_PAGE_SIZE: u32 = 25;

/// Invoices summed per customer for the subscriber table
pub const RECENT_INVOICE_LIMIT: u32 = 5;

/// Reduces remote subscription data into dashboard metrics
pub struct Aggregator {
    pub(super) api: Arc<dyn BillingApi>,
    pub(super) clock: Clock,
    pub(super) page_delay: Duration,
    pub(super) metrics: Option<Arc<EngineMetrics>>,
}

impl Aggregator {
    pub fn new(api: Arc<dyn BillingApi>) -> Self {
        Self {
            api,
            clock: Clock::System,
            page_delay: DEFAULT_PAGE_DELAY,
            metrics: None,
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<EngineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn api(&self) -> &dyn BillingApi {
        self.api.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(super) fn pager<Q: PagedQuery>(&self, query: Q) -> Pager<'_, Q> {
        Pager::new(self.api.as_ref(), query, self.page_delay, self.metrics.as_deref())
    }

    /// Pause between per-customer probes
    pub(super) async fn throttle(&self) {
        if !self.page_delay.is_zero() {
            tokio::time::sleep(self.page_delay).await;
        }
    }

    /// Walk every page of `query`, folding each record into `acc`
    pub(super) async fn fold_subscriptions<A>(
        &self,
        query: SubscriptionQuery,
        init: A,
        mut f: impl FnMut(A, &SubscriptionRecord) -> A,
    ) -> Result<A> {
        let mut pager = self.pager(query);
        let mut acc = init;
        while let Some(page) = pager.next_page().await? {
            for record in &page {
                acc = f(acc, record);
            }
        }
        Ok(acc)
    }

    /// Records matching `status`, optionally created at or after `since`
    #[instrument(skip(self))]
    pub async fn count_by_status(
        &self,
        status: SubscriptionStatus,
        since: Option<DateTime<Utc>>,
    ) -> Result<u64> {
        let mut query = SubscriptionQuery::with_status(status, PAGE_SIZE);
        if let Some(since) = since {
            query = query.created_since(since);
        }
        self.fold_subscriptions(query, 0u64, |count, _| count + 1).await
    }

    /// Active records created at or before `cutoff` (default: 90 days ago)
    #[instrument(skip(self))]
    pub async fn original_active_count(&self, cutoff: Option<DateTime<Utc>>) -> Result<u64> {
        let cutoff =
            cutoff.unwrap_or_else(|| self.now() - ChronoDuration::days(ORIGINAL_ACTIVE_DAYS));
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Active, PAGE_SIZE)
            .created_until(cutoff);
        self.fold_subscriptions(query, 0u64, |count, _| count + 1).await
    }

    /// Mean whole-day age of active subscriptions, 0 when there are none
    #[instrument(skip(self))]
    pub async fn average_duration_days(&self) -> Result<i64> {
        let now = self.now();
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Active, PAGE_SIZE);
        let (total, count) = self
            .fold_subscriptions(query, (0i64, 0i64), |(total, count), sub| {
                match sub.elapsed_days(now) {
                    Some(days) => (total + days, count + 1),
                    None => (total, count),
                }
            })
            .await?;

        if count == 0 {
            return Ok(0);
        }
        Ok(total / count)
    }

    /// Most frequent start-to-cancel span among canceled subscriptions
    #[instrument(skip(self))]
    pub async fn common_dropoff_period(&self) -> Result<String> {
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Canceled, PAGE_SIZE);
        let periods = self
            .fold_subscriptions(query, Vec::new(), |mut periods, sub| {
                if let Some(days) = sub.dropoff_days() {
                    periods.push(days);
                }
                periods
            })
            .await?;

        Ok(match most_common_period(&periods) {
            Some((days, customers)) => format_dropoff_period(days, customers),
            None => NO_DROPOFF_DATA.to_string(),
        })
    }

    /// Active subscriptions created in the trailing week
    pub async fn weekly_new_count(&self) -> Result<u64> {
        let since = self.now() - ChronoDuration::days(WEEK_DAYS);
        self.count_by_status(SubscriptionStatus::Active, Some(since)).await
    }

    /// Canceled subscriptions that ended in the trailing week.
    ///
    /// Falls back to the cancellation time when no end time is recorded.
    #[instrument(skip(self))]
    pub async fn weekly_cancelled_count(&self) -> Result<u64> {
        let since = self.now() - ChronoDuration::days(WEEK_DAYS);
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Canceled, PAGE_SIZE);
        self.fold_subscriptions(query, 0u64, |count, sub| match sub.ended_at.or(sub.canceled_at) {
            Some(ended) if ended >= since => count + 1,
            _ => count,
        })
        .await
    }

    /// Compute every metric, marking failed ones unavailable
    #[instrument(skip(self))]
    pub async fn snapshot(&self) -> MetricsSnapshot {
        let started = self.now();

        let active_count = settle(
            "active_count",
            self.count_by_status(SubscriptionStatus::Active, None).await,
        );
        let total_cancelled = settle(
            "total_cancelled",
            self.count_by_status(SubscriptionStatus::Canceled, None).await,
        );
        let original_active = settle("original_active", self.original_active_count(None).await);
        let new_this_week = settle("new_this_week", self.weekly_new_count().await);
        let cancelled_this_week =
            settle("cancelled_this_week", self.weekly_cancelled_count().await);
        let returning_count = settle("returning_count", self.returning_customers_count().await);
        let avg_duration_days = settle("avg_duration_days", self.average_duration_days().await);
        let common_dropoff = settle("common_dropoff", self.common_dropoff_period().await);

        let retention_rate = match (active_count, total_cancelled) {
            (Some(active), Some(cancelled)) => Some(retention_rate(active, cancelled)),
            _ => None,
        };

        let snapshot = MetricsSnapshot {
            active_count,
            original_active,
            retention_rate,
            avg_duration_days,
            new_this_week,
            cancelled_this_week,
            returning_count,
            total_cancelled,
            common_dropoff,
            last_updated: started,
        };

        let unavailable = snapshot.unavailable_metrics();
        if unavailable.is_empty() {
            info!("Metrics snapshot computed");
        } else {
            warn!(unavailable = ?unavailable, "Metrics snapshot computed with unavailable metrics");
        }
        snapshot
    }
}

/// Turn a metric result into a snapshot field, logging failures
fn settle<T: std::fmt::Debug>(metric: &'static str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => {
            info!(metric, value = ?value, "Metric computed");
            Some(value)
        }
        Err(e) => {
            warn!(metric, error = %e, "Metric unavailable");
            None
        }
    }
}
