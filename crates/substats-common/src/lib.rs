//! # Substats Common
//!
//! Shared records, errors, and time source for Substats subscription analytics.
//!
//! ## Core Types
//!
//! - [`SubscriptionRecord`]/[`InvoiceRecord`]: read-only records owned by the billing API
//! - [`MetricsSnapshot`]: computed dashboard metrics, each explicitly optional
//! - [`SubscriberRow`]: one row of the top-subscriber table
//! - [`CustomerValue`]: a customer ranked by lifetime paid value

pub mod clock;
pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use clock::Clock;
pub use error::{AnalyticsError, RemoteError, Result};
pub use types::{
    invoice::{minor_to_major, InvoiceRecord, InvoiceStatus},
    snapshot::{retention_rate, CustomerValue, MetricsSnapshot, SubscriberRow},
    subscription::{Customer, CustomerRef, SubscriptionRecord, SubscriptionStatus, SECONDS_PER_DAY},
};

/// Substats version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Age in days after which an active subscription counts as "original"
pub const ORIGINAL_ACTIVE_DAYS: i64 = 90;

/// Trailing window for weekly metrics, in days
pub const WEEK_DAYS: i64 = 7;

/// Maximum rows in the top-subscriber table
pub const MAX_TOP_SUBSCRIBERS: usize = 25;

/// Default number of customers in the report's top-customer list
pub const DEFAULT_TOP_CUSTOMERS: usize = 5;
