//! Remote billing API seam
//!
//! Cursor-paginated list calls for subscriptions and invoices, plus a
//! lightweight balance probe used to verify connectivity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use substats_common::{InvoiceRecord, InvoiceStatus, Result, SubscriptionRecord, SubscriptionStatus};

/// Largest page the remote API serves
pub const MAX_PAGE_SIZE: u32 = 100;

/// One page of a list call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub has_more: bool,
}

impl<T> Page<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            has_more: false,
        }
    }
}

/// Items that can serve as a `starting_after` cursor
pub trait Cursored {
    fn cursor_id(&self) -> &str;
}

impl Cursored for SubscriptionRecord {
    fn cursor_id(&self) -> &str {
        &self.id
    }
}

impl Cursored for InvoiceRecord {
    fn cursor_id(&self) -> &str {
        &self.id
    }
}

/// Filter for the subscription list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionQuery {
    pub status: Option<SubscriptionStatus>,
    pub created_gte: Option<DateTime<Utc>>,
    pub created_lte: Option<DateTime<Utc>>,
    pub customer: Option<String>,
    pub limit: u32,
    pub starting_after: Option<String>,
    /// Expand `data.customer` so emails are available
    pub expand_customer: bool,
}

impl SubscriptionQuery {
    pub fn with_status(status: SubscriptionStatus, limit: u32) -> Self {
        Self {
            status: Some(status),
            limit,
            ..Default::default()
        }
    }

    pub fn created_since(mut self, since: DateTime<Utc>) -> Self {
        self.created_gte = Some(since);
        self
    }

    pub fn created_until(mut self, until: DateTime<Utc>) -> Self {
        self.created_lte = Some(until);
        self
    }

    pub fn for_customer(mut self, customer: impl Into<String>) -> Self {
        self.customer = Some(customer.into());
        self
    }

    pub fn expanding_customer(mut self) -> Self {
        self.expand_customer = true;
        self
    }

    /// Render as form-style query parameters
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("limit".to_string(), clamp_limit(self.limit).to_string())];
        if let Some(status) = self.status {
            params.push(("status".into(), status.as_str().into()));
        }
        if let Some(gte) = self.created_gte {
            params.push(("created[gte]".into(), gte.timestamp().to_string()));
        }
        if let Some(lte) = self.created_lte {
            params.push(("created[lte]".into(), lte.timestamp().to_string()));
        }
        if let Some(customer) = &self.customer {
            params.push(("customer".into(), customer.clone()));
        }
        if let Some(cursor) = &self.starting_after {
            params.push(("starting_after".into(), cursor.clone()));
        }
        if self.expand_customer {
            params.push(("expand[]".into(), "data.customer".into()));
        }
        params
    }
}

/// Filter for the invoice list call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvoiceQuery {
    pub customer: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub limit: u32,
    pub starting_after: Option<String>,
}

impl InvoiceQuery {
    pub fn for_customer(customer: impl Into<String>, limit: u32) -> Self {
        Self {
            customer: Some(customer.into()),
            limit,
            ..Default::default()
        }
    }

    pub fn with_status(mut self, status: InvoiceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("limit".to_string(), clamp_limit(self.limit).to_string())];
        if let Some(customer) = &self.customer {
            params.push(("customer".into(), customer.clone()));
        }
        if let Some(status) = self.status {
            params.push(("status".into(), status.as_str().into()));
        }
        if let Some(cursor) = &self.starting_after {
            params.push(("starting_after".into(), cursor.clone()));
        }
        params
    }
}

fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_SIZE)
}

/// Remote billing API
#[async_trait]
pub trait BillingApi: Send + Sync {
    /// List one page of subscriptions
    async fn list_subscriptions(
        &self,
        query: &SubscriptionQuery,
    ) -> Result<Page<SubscriptionRecord>>;

    /// List one page of invoices
    async fn list_invoices(&self, query: &InvoiceQuery) -> Result<Page<InvoiceRecord>>;

    /// Retrieve the account balance; used only as a connectivity probe
    async fn retrieve_balance(&self) -> Result<()>;
}

/// A list query that can be re-issued from a cursor
#[async_trait]
pub trait PagedQuery: Clone + Send + Sync {
    type Item: Cursored + Send;

    /// Resource label used in logs and metrics
    const RESOURCE: &'static str;

    async fn fetch(&self, api: &dyn BillingApi) -> Result<Page<Self::Item>>;

    fn set_starting_after(&mut self, cursor: String);
}

#[async_trait]
impl PagedQuery for SubscriptionQuery {
    type Item = SubscriptionRecord;
    const RESOURCE: &'static str = "subscriptions";

    async fn fetch(&self, api: &dyn BillingApi) -> Result<Page<SubscriptionRecord>> {
        api.list_subscriptions(self).await
    }

    fn set_starting_after(&mut self, cursor: String) {
        self.starting_after = Some(cursor);
    }
}

#[async_trait]
impl PagedQuery for InvoiceQuery {
    type Item = InvoiceRecord;
    const RESOURCE: &'static str = "invoices";

    async fn fetch(&self, api: &dyn BillingApi) -> Result<Page<InvoiceRecord>> {
        api.list_invoices(self).await
    }

    fn set_starting_after(&mut self, cursor: String) {
        self.starting_after = Some(cursor);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_subscription_query_params() {
        let since = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut query = SubscriptionQuery::with_status(SubscriptionStatus::Active, 100)
            .created_since(since)
            .expanding_customer();
        query.starting_after = Some("sub_9".into());

        let params = query.to_params();
        assert!(params.contains(&("limit".into(), "100".into())));
        assert!(params.contains(&("status".into(), "active".into())));
        assert!(params.contains(&("created[gte]".into(), "1700000000".into())));
        assert!(params.contains(&("starting_after".into(), "sub_9".into())));
        assert!(params.contains(&("expand[]".into(), "data.customer".into())));
        assert!(!params.iter().any(|(k, _)| k == "created[lte]"));
    }

    #[test]
    fn test_limit_is_clamped() {
        let query = SubscriptionQuery::with_status(SubscriptionStatus::Canceled, 500);
        assert_eq!(query.to_params()[0], ("limit".to_string(), "100".to_string()));

        let query = InvoiceQuery::for_customer("cus_1", 0).with_status(InvoiceStatus::Paid);
        let params = query.to_params();
        assert_eq!(params[0], ("limit".to_string(), "1".to_string()));
        assert!(params.contains(&("status".into(), "paid".into())));
    }
}
