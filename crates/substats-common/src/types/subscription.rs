//! Subscription records as returned by the billing API
//!
//! Records are read-only to this system. Optional timestamps are modeled
//! explicitly so aggregation code never probes for field presence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Seconds in one day
pub const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Subscription lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    Canceled,
    Incomplete,
    IncompleteExpired,
    PastDue,
    Paused,
    Trialing,
    Unpaid,
    /// Any status this system does not know about
    #[serde(other)]
    Other,
}

impl SubscriptionStatus {
    /// Wire name used in list filters
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Canceled => "canceled",
            SubscriptionStatus::Incomplete => "incomplete",
            SubscriptionStatus::IncompleteExpired => "incomplete_expired",
            SubscriptionStatus::PastDue => "past_due",
            SubscriptionStatus::Paused => "paused",
            SubscriptionStatus::Trialing => "trialing",
            SubscriptionStatus::Unpaid => "unpaid",
            SubscriptionStatus::Other => "all",
        }
    }
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Expanded customer object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Customer reference: a bare id, or the expanded object when the list
/// call asked for `data.customer`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CustomerRef {
    Expanded(Customer),
    Id(String),
}

impl CustomerRef {
    pub fn id(&self) -> &str {
        match self {
            CustomerRef::Expanded(customer) => &customer.id,
            CustomerRef::Id(id) => id,
        }
    }

    /// Email, only known when the customer was expanded
    pub fn email(&self) -> Option<&str> {
        match self {
            CustomerRef::Expanded(customer) => customer.email.as_deref().filter(|e| !e.is_empty()),
            CustomerRef::Id(_) => None,
        }
    }
}

/// A subscription record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Subscription ID (also the pagination cursor)
    pub id: String,
    /// Lifecycle status at query time
    pub status: SubscriptionStatus,
    /// Owning customer
    pub customer: CustomerRef,
    /// Creation time
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
    /// Start of the current subscription
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub start_date: Option<DateTime<Utc>>,
    /// When cancellation was requested
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub canceled_at: Option<DateTime<Utc>>,
    /// When the subscription ended
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub ended_at: Option<DateTime<Utc>>,
}

impl SubscriptionRecord {
    pub fn customer_id(&self) -> &str {
        self.customer.id()
    }

    pub fn customer_email(&self) -> Option<&str> {
        self.customer.email()
    }

    /// Whole days elapsed between start and `now`, truncated
    pub fn elapsed_days(&self, now: DateTime<Utc>) -> Option<i64> {
        self.start_date
            .map(|start| (now - start).num_seconds().div_euclid(SECONDS_PER_DAY))
    }

    /// Days between start and cancellation, rounded to the nearest day.
    ///
    /// `None` when either timestamp is missing or the span is negative.
    pub fn dropoff_days(&self) -> Option<i64> {
        let start = self.start_date?;
        let canceled = self.canceled_at?;
        let seconds = (canceled - start).num_seconds();
        let days = (seconds as f64 / SECONDS_PER_DAY as f64).round() as i64;
        (days >= 0).then_some(days)
    }
}
