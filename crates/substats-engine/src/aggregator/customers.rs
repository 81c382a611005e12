//! Per-customer aggregations: returning customers and value rankings

use super::stats::{Aggregator, CUSTOMER_PAGE_SIZE, PAGE_SIZE, RECENT_INVOICE_LIMIT};
use crate::billing::{InvoiceQuery, SubscriptionQuery};
use chrono::Duration as ChronoDuration;
use rust_decimal::Decimal;
use std::collections::HashSet;
use substats_common::{
    CustomerValue, InvoiceStatus, Result, SubscriberRow, SubscriptionStatus, MAX_TOP_SUBSCRIBERS,
    ORIGINAL_ACTIVE_DAYS, SECONDS_PER_DAY,
};
use tracing::{debug, instrument};

impl Aggregator {
    /// Active customers that also hold at least one canceled subscription
    #[instrument(skip(self))]
    pub async fn returning_customers_count(&self) -> Result<u64> {
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Active, PAGE_SIZE);
        let customers = self
            .fold_subscriptions(query, UniqueCustomers::default(), |mut customers, sub| {
                customers.insert(sub.customer_id());
                customers
            })
            .await?;

        let mut returning = 0u64;
        for (i, customer) in customers.ids.iter().enumerate() {
            if i > 0 {
                self.throttle().await;
            }
            let probe = SubscriptionQuery::with_status(SubscriptionStatus::Canceled, 1)
                .for_customer(customer.as_str());
            let mut pager = self.pager(probe);
            if pager.next_page().await?.map_or(false, |page| !page.is_empty()) {
                returning += 1;
            }
        }

        debug!(customers = customers.ids.len(), returning, "Checked returning customers");
        Ok(returning)
    }

    /// Highest-value long-standing subscribers.
    ///
    /// Considers active subscriptions at least 90 days old, one row per
    /// customer with an email, valued by their most recent paid invoices.
    /// Collection stops once `max` (at most 25) customers qualify; rows are
    /// returned in descending value order.
    #[instrument(skip(self))]
    pub async fn top_subscribers(&self, max: usize) -> Result<Vec<SubscriberRow>> {
        let max = max.min(MAX_TOP_SUBSCRIBERS);
        let now = self.now();
        let cutoff = now - ChronoDuration::days(ORIGINAL_ACTIVE_DAYS);
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Active, CUSTOMER_PAGE_SIZE)
            .created_until(cutoff)
            .expanding_customer();

        let mut rows: Vec<SubscriberRow> = Vec::new();
        let mut seen = HashSet::new();
        let mut pager = self.pager(query);

        'pages: while rows.len() < max {
            let Some(page) = pager.next_page().await? else {
                break;
            };
            for sub in page {
                if !seen.insert(sub.customer_id().to_string()) {
                    continue;
                }
                let Some(email) = sub.customer_email() else {
                    continue;
                };

                let total_value = self.recent_paid_total(sub.customer_id()).await?;
                if total_value <= Decimal::ZERO {
                    continue;
                }

                let signup = sub.start_date.unwrap_or(sub.created);
                rows.push(SubscriberRow {
                    customer_id: sub.customer_id().to_string(),
                    email: email.to_string(),
                    signup_date: signup.date_naive(),
                    duration_days: (now - signup).num_seconds().div_euclid(SECONDS_PER_DAY),
                    total_value,
                });
                if rows.len() >= max {
                    break 'pages;
                }
            }
        }

        rows.sort_by(|a, b| b.total_value.cmp(&a.total_value));
        Ok(rows)
    }

    /// Active customers ranked by lifetime paid value, top `max` kept
    #[instrument(skip(self))]
    pub async fn top_customers_by_value(&self, max: usize) -> Result<Vec<CustomerValue>> {
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Active, CUSTOMER_PAGE_SIZE)
            .expanding_customer();

        let mut customers: Vec<CustomerValue> = Vec::new();
        let mut seen = HashSet::new();
        let mut pager = self.pager(query);

        while let Some(page) = pager.next_page().await? {
            for sub in page {
                if !seen.insert(sub.customer_id().to_string()) {
                    continue;
                }
                let Some(email) = sub.customer_email() else {
                    continue;
                };

                let total_value = self.lifetime_paid_total(sub.customer_id()).await?;
                if total_value > Decimal::ZERO {
                    customers.push(CustomerValue {
                        customer_id: sub.customer_id().to_string(),
                        email: email.to_string(),
                        start_date: sub.start_date.map(|start| start.date_naive()),
                        total_value,
                    });
                }
            }
        }

        customers.sort_by(|a, b| b.total_value.cmp(&a.total_value));
        customers.truncate(max);
        Ok(customers)
    }

    /// Total of the customer's most recent paid invoices
    async fn recent_paid_total(&self, customer: &str) -> Result<Decimal> {
        self.throttle().await;
        let query = InvoiceQuery::for_customer(customer, RECENT_INVOICE_LIMIT)
            .with_status(InvoiceStatus::Paid);
        let mut pager = self.pager(query);
        let invoices = pager.next_page().await?.unwrap_or_default();
        Ok(invoices.iter().map(|invoice| invoice.amount_paid_major()).sum())
    }

    /// Paid total over the customer's full invoice history
    async fn lifetime_paid_total(&self, customer: &str) -> Result<Decimal> {
        self.throttle().await;
        let query = InvoiceQuery::for_customer(customer, PAGE_SIZE)
            .with_status(InvoiceStatus::Paid);
        let mut pager = self.pager(query);
        let mut total = Decimal::ZERO;
        while let Some(page) = pager.next_page().await? {
            total += page.iter().map(|invoice| invoice.amount_paid_major()).sum::<Decimal>();
        }
        Ok(total)
    }
}

/// Customer ids in first-seen order
#[derive(Default)]
struct UniqueCustomers {
    seen: HashSet<String>,
    ids: Vec<String>,
}

impl UniqueCustomers {
    fn insert(&mut self, id: &str) {
        if self.seen.insert(id.to_string()) {
            self.ids.push(id.to_string());
        }
    }
}
