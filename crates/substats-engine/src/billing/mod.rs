//! Billing module
//!
//! Remote billing API access:
//! - BillingApi: the paginated list/probe seam the aggregator depends on
//! - StripeClient: REST implementation over reqwest
//! - InMemoryBilling: fixture-backed implementation

pub mod api;
pub mod memory;
pub mod stripe;

pub use api::{
    BillingApi, Cursored, InvoiceQuery, Page, PagedQuery, SubscriptionQuery, MAX_PAGE_SIZE,
};
pub use memory::InMemoryBilling;
pub use stripe::{StripeClient, DEFAULT_API_BASE};
