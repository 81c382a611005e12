//! Aggregation of remote subscription data into dashboard metrics

mod customers;
mod dropoff;
mod pager;
mod stats;

pub use dropoff::most_common_period;
pub use pager::Pager;
pub use stats::{
    Aggregator, CUSTOMER_PAGE_SIZE, DEFAULT_PAGE_DELAY, PAGE_SIZE, RECENT_INVOICE_LIMIT,
};
