//! In-memory billing backend
//!
//! Serves a fixed set of records with the same filtering and cursor
//! semantics as the remote API. Used for local demos and tests; counts
//! every call and can be told to fail.

use super::api::{BillingApi, InvoiceQuery, Page, SubscriptionQuery};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicUsize, Ordering};
use substats_common::{
    CustomerRef, InvoiceRecord, RemoteError, Result, SubscriptionRecord, SubscriptionStatus,
};

/// In-memory billing API
///
/// Subscriptions are served in insertion order; invoices newest first.
#[derive(Default)]
pub struct InMemoryBilling {
    subscriptions: RwLock<Vec<SubscriptionRecord>>,
    invoices: RwLock<Vec<InvoiceRecord>>,
    subscription_calls: AtomicUsize,
    invoice_calls: AtomicUsize,
    balance_calls: AtomicUsize,
    /// Fail every call once this many calls have been served
    fail_after: RwLock<Option<usize>>,
}

impl InMemoryBilling {
    pub fn new(subscriptions: Vec<SubscriptionRecord>, invoices: Vec<InvoiceRecord>) -> Self {
        let billing = Self::default();
        *billing.subscriptions.write() = subscriptions;
        billing.set_invoices(invoices);
        billing
    }

    pub fn push_subscription(&self, subscription: SubscriptionRecord) {
        self.subscriptions.write().push(subscription);
    }

    pub fn set_invoices(&self, mut invoices: Vec<InvoiceRecord>) {
        invoices.sort_by(|a, b| b.created.cmp(&a.created));
        *self.invoices.write() = invoices;
    }

    /// Fail all calls after `calls` successful ones
    pub fn fail_after(&self, calls: usize) {
        *self.fail_after.write() = Some(calls);
    }

    /// Stop injecting failures
    pub fn recover(&self) {
        *self.fail_after.write() = None;
    }

    pub fn subscription_calls(&self) -> usize {
        self.subscription_calls.load(Ordering::SeqCst)
    }

    pub fn invoice_calls(&self) -> usize {
        self.invoice_calls.load(Ordering::SeqCst)
    }

    /// Total remote calls served or refused
    pub fn total_calls(&self) -> usize {
        self.subscription_calls() + self.invoice_calls() + self.balance_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self, calls_before: usize) -> Result<()> {
        match *self.fail_after.read() {
            Some(limit) if calls_before >= limit => {
                Err(RemoteError::Transport("injected failure".into()).into())
            }
            _ => Ok(()),
        }
    }
}

/// Slice `items` after the cursor and cut one page
fn paginate<T: Clone>(
    items: Vec<T>,
    cursor: Option<&str>,
    limit: u32,
    id: impl Fn(&T) -> &str,
) -> Page<T> {
    let start = match cursor {
        Some(cursor) => match items.iter().position(|item| id(item) == cursor) {
            Some(pos) => pos + 1,
            None => items.len(),
        },
        None => 0,
    };
    let limit = limit.clamp(1, super::api::MAX_PAGE_SIZE) as usize;
    let rest = &items[start.min(items.len())..];
    let data: Vec<T> = rest.iter().take(limit).cloned().collect();
    Page {
        has_more: rest.len() > data.len(),
        data,
    }
}

#[async_trait]
impl BillingApi for InMemoryBilling {
    async fn list_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Page<SubscriptionRecord>> {
        let calls_before = self.total_calls();
        self.subscription_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(calls_before)?;

        let matching: Vec<SubscriptionRecord> = self
            .subscriptions
            .read()
            .iter()
            .filter(|sub| match query.status {
                Some(SubscriptionStatus::Other) | None => true,
                Some(status) => sub.status == status,
            })
            .filter(|sub| query.created_gte.map_or(true, |gte| sub.created >= gte))
            .filter(|sub| query.created_lte.map_or(true, |lte| sub.created <= lte))
            .filter(|sub| query.customer.as_deref().map_or(true, |c| sub.customer_id() == c))
            .map(|sub| {
                let mut sub = sub.clone();
                if !query.expand_customer {
                    sub.customer = CustomerRef::Id(sub.customer_id().to_string());
                }
                sub
            })
            .collect();

        Ok(paginate(matching, query.starting_after.as_deref(), query.limit, |s| s.id.as_str()))
    }

    async fn list_invoices(&self, query: &InvoiceQuery) -> Result<Page<InvoiceRecord>> {
        let calls_before = self.total_calls();
        self.invoice_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(calls_before)?;

        let matching: Vec<InvoiceRecord> = self
            .invoices
            .read()
            .iter()
            .filter(|inv| query.customer.as_deref().map_or(true, |c| inv.customer == c))
            .filter(|inv| query.status.map_or(true, |s| inv.status == s))
            .cloned()
            .collect();

        Ok(paginate(matching, query.starting_after.as_deref(), query.limit, |i| i.id.as_str()))
    }

    async fn retrieve_balance(&self) -> Result<()> {
        let calls_before = self.total_calls();
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure(calls_before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use substats_common::Customer;

    fn sub(id: &str, status: SubscriptionStatus, created: i64) -> SubscriptionRecord {
        let at = Utc.timestamp_opt(created, 0).unwrap();
        SubscriptionRecord {
            id: id.into(),
            status,
            customer: CustomerRef::Expanded(Customer {
                id: format!("cus_{}", id),
                email: Some(format!("{}@example.com", id)),
            }),
            created: at,
            start_date: Some(at),
            canceled_at: None,
            ended_at: None,
        }
    }

    #[tokio::test]
    async fn test_pagination_walks_all_records() {
        let subs = (0..5)
            .map(|i| sub(&format!("s{}", i), SubscriptionStatus::Active, 1000 + i))
            .collect();
        let billing = InMemoryBilling::new(subs, vec![]);

        let mut query = SubscriptionQuery::with_status(SubscriptionStatus::Active, 2);
        let first = billing.list_subscriptions(&query).await.unwrap();
        assert_eq!(first.data.len(), 2);
        assert!(first.has_more);

        query.starting_after = Some(first.data[1].id.clone());
        let second = billing.list_subscriptions(&query).await.unwrap();
        assert_eq!(second.data[0].id, "s2");

        query.starting_after = Some("s3".into());
        let last = billing.list_subscriptions(&query).await.unwrap();
        assert_eq!(last.data.len(), 1);
        assert!(!last.has_more);
        assert_eq!(billing.subscription_calls(), 3);
    }

    #[tokio::test]
    async fn test_customer_collapsed_without_expand() {
        let billing = InMemoryBilling::new(vec![sub("a", SubscriptionStatus::Active, 1)], vec![]);
        let page = billing
            .list_subscriptions(&SubscriptionQuery::with_status(SubscriptionStatus::Active, 10))
            .await
            .unwrap();
        assert_eq!(page.data[0].customer, CustomerRef::Id("cus_a".into()));
    }

    #[tokio::test]
    async fn test_injected_failure() {
        let billing = InMemoryBilling::new(vec![], vec![]);
        billing.fail_after(1);
        assert!(billing.retrieve_balance().await.is_ok());
        assert!(billing.retrieve_balance().await.is_err());
        billing.recover();
        assert!(billing.retrieve_balance().await.is_ok());
    }
}
