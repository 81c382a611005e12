//! End-to-end tests for the analytics engine
//!
//! Runs the aggregator, cache and report paths against a fixed fixture:
//! - 10 active and 5 canceled subscriptions with known timestamps
//! - invoices for the long-standing customers
//! - a fixed clock so every expected value is hand-computable

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;
use substats_common::{
    Clock, Customer, CustomerRef, InvoiceRecord, InvoiceStatus, SubscriptionRecord,
    SubscriptionStatus,
};
use substats_engine::{
    Aggregator, AnalyticsService, InMemoryBilling, InMemoryCache, MemoryMailer, ServiceConfig,
};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap()
}

fn days_ago(days: i64) -> DateTime<Utc> {
    now() - ChronoDuration::days(days)
}

fn customer(n: u32) -> CustomerRef {
    CustomerRef::Expanded(Customer {
        id: format!("cus_{:02}", n),
        email: Some(format!("customer{:02}@example.com", n)),
    })
}

fn active(id: &str, n: u32, age: ChronoDuration) -> SubscriptionRecord {
    let started = now() - age;
    SubscriptionRecord {
        id: id.into(),
        status: SubscriptionStatus::Active,
        customer: customer(n),
        created: started,
        start_date: Some(started),
        canceled_at: None,
        ended_at: None,
    }
}

fn canceled(id: &str, n: u32, started_days_ago: i64, canceled_days_ago: i64) -> SubscriptionRecord {
    SubscriptionRecord {
        id: id.into(),
        status: SubscriptionStatus::Canceled,
        customer: customer(n),
        created: days_ago(started_days_ago),
        start_date: Some(days_ago(started_days_ago)),
        canceled_at: Some(days_ago(canceled_days_ago)),
        ended_at: Some(days_ago(canceled_days_ago)),
    }
}

fn invoice(id: &str, n: u32, cents: i64, status: InvoiceStatus, days: i64) -> InvoiceRecord {
    InvoiceRecord {
        id: id.into(),
        customer: format!("cus_{:02}", n),
        status,
        amount_paid: cents,
        created: days_ago(days),
    }
}

/// Active ages: 5, 20, 30, 40, 50, 100, 150, 200, 365, 400 days (sum 1360).
/// Two of them carry a few extra hours, which must truncate away.
///
/// Canceled spans in list order: 30, 30, 10, 365, 10 days. Customers 03, 05
/// and 07 hold both an active and a canceled subscription.
fn subscriptions() -> Vec<SubscriptionRecord> {
    let ages = [5, 20, 30, 40, 50, 100, 150, 200, 365, 400];
    let mut subs: Vec<SubscriptionRecord> = ages
        .iter()
        .enumerate()
        .map(|(i, &days)| {
            let n = i as u32 + 1;
            let mut age = ChronoDuration::days(days);
            if n == 2 || n == 9 {
                age = age + ChronoDuration::hours(20);
            }
            active(&format!("sub_a{:02}", n), n, age)
        })
        .collect();

    subs.push(canceled("sub_c01", 3, 300, 270));
    subs.push(canceled("sub_c02", 5, 200, 170));
    subs.push(canceled("sub_c03", 11, 13, 3));
    subs.push(canceled("sub_c04", 12, 400, 35));
    subs.push(canceled("sub_c05", 7, 60, 50));
    subs
}

/// Invoices for the customers subscribed 90+ days (06..=10)
fn invoices() -> Vec<InvoiceRecord> {
    let mut invoices = vec![
        invoice("in_06a", 6, 1000, InvoiceStatus::Paid, 1),
        invoice("in_06b", 6, 1000, InvoiceStatus::Paid, 31),
        invoice("in_06c", 6, 1000, InvoiceStatus::Paid, 61),
        invoice("in_07a", 7, 25000, InvoiceStatus::Paid, 2),
        invoice("in_10a", 10, 2000, InvoiceStatus::Paid, 3),
        invoice("in_10b", 10, 9999, InvoiceStatus::Void, 4),
    ];
    for i in 0..7 {
        invoices.push(invoice(&format!("in_09{}", i), 9, 500, InvoiceStatus::Paid, 5 + i * 30));
    }
    invoices
}

struct Harness {
    billing: Arc<InMemoryBilling>,
    mailer: Arc<MemoryMailer>,
    service: AnalyticsService,
}

impl Harness {
    fn new() -> Self {
        let billing = Arc::new(InMemoryBilling::new(subscriptions(), invoices()));
        let mailer = Arc::new(MemoryMailer::new());
        let config = ServiceConfig {
            site_name: "Fixture Shop".into(),
            dashboard_url: "https://shop.example.com/dashboard".into(),
            default_recipients: vec!["owner@example.com".into()],
            ..Default::default()
        };
        let service = AnalyticsService::new(
            Some(aggregator(billing.clone())),
            Arc::new(InMemoryCache::new()),
            mailer.clone(),
            config,
        )
        .with_clock(Clock::Fixed(now()));

        Self {
            billing,
            mailer,
            service,
        }
    }
}

fn aggregator(billing: Arc<InMemoryBilling>) -> Aggregator {
    Aggregator::new(billing)
        .with_clock(Clock::Fixed(now()))
        .with_page_delay(Duration::ZERO)
}

#[cfg(test)]
mod aggregation_tests {
    use super::*;

    /// Test: mean active age is truncated to whole days
    #[tokio::test]
    async fn test_average_duration_matches_fixture() {
        let agg = aggregator(Arc::new(InMemoryBilling::new(subscriptions(), invoices())));
        // 1360 / 10
        assert_eq!(agg.average_duration_days().await.unwrap(), 136);
    }

    /// Test: customers 03, 05 and 07 are returning
    #[tokio::test]
    async fn test_returning_customers_match_fixture() {
        let agg = aggregator(Arc::new(InMemoryBilling::new(subscriptions(), invoices())));
        assert_eq!(agg.returning_customers_count().await.unwrap(), 3);
    }

    /// Test: 30 and 10 days tie at two each, 30 is seen first
    #[tokio::test]
    async fn test_dropoff_matches_fixture() {
        let agg = aggregator(Arc::new(InMemoryBilling::new(subscriptions(), invoices())));
        assert_eq!(agg.common_dropoff_period().await.unwrap(), "1 months (2 customers)");
    }

    /// Test: every snapshot field from one pass over the fixture
    #[tokio::test]
    async fn test_full_snapshot() {
        let agg = aggregator(Arc::new(InMemoryBilling::new(subscriptions(), invoices())));
        let snapshot = agg.snapshot().await;

        assert!(snapshot.is_complete());
        assert_eq!(snapshot.active_count, Some(10));
        assert_eq!(snapshot.total_cancelled, Some(5));
        assert_eq!(snapshot.retention_rate, Some(67));
        assert_eq!(snapshot.original_active, Some(5));
        assert_eq!(snapshot.new_this_week, Some(1));
        assert_eq!(snapshot.cancelled_this_week, Some(1));
        assert_eq!(snapshot.returning_count, Some(3));
        assert_eq!(snapshot.avg_duration_days, Some(136));
        assert_eq!(snapshot.common_dropoff.as_deref(), Some("1 months (2 customers)"));
        assert_eq!(snapshot.last_updated, now());
    }

    /// Test: subscriber table is ranked by the five most recent invoices
    #[tokio::test]
    async fn test_top_subscribers_ranking() {
        let agg = aggregator(Arc::new(InMemoryBilling::new(subscriptions(), invoices())));
        let rows = agg.top_subscribers(25).await.unwrap();

        let ranked: Vec<(&str, _)> = rows
            .iter()
            .map(|r| (r.customer_id.as_str(), r.total_value))
            .collect();
        assert_eq!(
            ranked,
            vec![
                ("cus_07", dec!(250.00)),
                ("cus_06", dec!(30.00)),
                ("cus_09", dec!(25.00)),
                ("cus_10", dec!(20.00)),
            ]
        );
        assert!(rows.len() <= 25);
        assert!(rows.windows(2).all(|w| w[0].total_value >= w[1].total_value));
        assert!(rows.iter().all(|r| r.total_value > dec!(0)));
    }

    /// Test: top customers use the full paid history
    #[tokio::test]
    async fn test_top_customers_by_value() {
        let agg = aggregator(Arc::new(InMemoryBilling::new(subscriptions(), invoices())));
        let top = agg.top_customers_by_value(5).await.unwrap();

        let ids: Vec<&str> = top.iter().map(|c| c.customer_id.as_str()).collect();
        assert_eq!(ids, vec!["cus_07", "cus_09", "cus_06", "cus_10"]);
        assert_eq!(top[1].total_value, dec!(35.00));
    }
}

#[cfg(test)]
mod cache_tests {
    use super::*;

    /// Test: a second read within the TTL makes no remote calls
    #[tokio::test]
    async fn test_cached_stats_issue_no_calls() {
        let harness = Harness::new();

        let first = harness.service.get_dashboard_stats(false).await.unwrap();
        let calls = harness.billing.total_calls();
        assert!(calls > 0);

        let second = harness.service.get_dashboard_stats(false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(harness.billing.total_calls(), calls);
    }

    /// Test: force refresh recomputes every time
    #[tokio::test]
    async fn test_force_refresh_recomputes() {
        let harness = Harness::new();
        harness.service.get_dashboard_stats(false).await.unwrap();

        let before = harness.billing.total_calls();
        harness.service.get_dashboard_stats(true).await.unwrap();
        let after_first = harness.billing.total_calls();
        harness.service.get_dashboard_stats(true).await.unwrap();

        assert!(after_first > before);
        assert_eq!(harness.billing.total_calls() - after_first, after_first - before);
    }

    /// Test: snapshot and subscriber table are cached independently
    #[tokio::test]
    async fn test_entries_are_independent() {
        let harness = Harness::new();
        harness.service.get_dashboard_stats(false).await.unwrap();

        let before = harness.billing.total_calls();
        let rows = harness.service.get_subscriber_table(false).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert!(harness.billing.total_calls() > before);

        let cached = harness.billing.total_calls();
        harness.service.get_subscriber_table(false).await.unwrap();
        harness.service.get_dashboard_stats(false).await.unwrap();
        assert_eq!(harness.billing.total_calls(), cached);
    }

    /// Test: new data shows up only after a forced refresh
    #[tokio::test]
    async fn test_new_subscription_visible_after_refresh() {
        let harness = Harness::new();
        let before = harness.service.get_dashboard_stats(false).await.unwrap();

        harness
            .billing
            .push_subscription(active("sub_a99", 99, ChronoDuration::days(1)));

        let cached = harness.service.get_dashboard_stats(false).await.unwrap();
        assert_eq!(cached.active_count, before.active_count);

        let fresh = harness.service.get_dashboard_stats(true).await.unwrap();
        assert_eq!(fresh.active_count, Some(11));
        assert_eq!(fresh.new_this_week, Some(2));
    }
}

#[cfg(test)]
mod report_tests {
    use super::*;

    /// Test: weekly report carries live metrics and the top customers
    #[tokio::test]
    async fn test_weekly_report_content() {
        let harness = Harness::new();
        harness.service.weekly_report_job().await.unwrap();

        let sent = harness.mailer.sent();
        assert_eq!(sent.len(), 1);
        let message = &sent[0];
        assert_eq!(message.to, vec!["owner@example.com"]);
        assert_eq!(message.subject, "Stripe Analytics Weekly Report - Fixture Shop");

        let body = &message.body;
        assert!(body.starts_with(
            "**STRIPE ANALYTICS WEEKLY REPORT**\nGenerated: March 4, 2024 9:00 am\n"
        ));
        assert!(body.contains("Active Subscribers: 10\n"));
        assert!(body.contains("Current Retention Rate: 67%\n"));
        assert!(body.contains("Average Subscription Length: 4 months, 16 days\n"));
        assert!(body.contains("Most Common Drop-off Period: 1 months (2 customers)\n"));
        assert!(body.contains(
            "1. customer07@example.com (Since 2023-10-06)\n   Total Value: $250.00\n"
        ));
        assert!(body.contains("View detailed analytics: https://shop.example.com/dashboard\n"));
    }

    /// Test: remote outage degrades to visibly unavailable metrics
    #[tokio::test]
    async fn test_test_report_during_outage() {
        let harness = Harness::new();
        harness.billing.fail_after(0);

        let recipients = harness.service.send_test_report().await.unwrap();
        assert_eq!(recipients, vec!["owner@example.com"]);

        let body = &harness.mailer.sent()[0].body;
        assert!(body.contains("Active Subscribers: unavailable\n"));
        assert!(body.contains("Current Retention Rate: unavailable\n"));
        assert!(!body.contains("Active Subscribers: 0\n"));
    }
}
