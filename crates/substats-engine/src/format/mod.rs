//! Human-readable rendering of metrics, subscriber rows and reports

mod duration;
mod email;
mod table;

pub use duration::{format_dropoff_period, format_duration, NO_DROPOFF_DATA};
pub use email::{
    format_email_address, format_email_body, format_top_customers, ReportContext, ReportKind,
    TopCustomers, UNAVAILABLE,
};
pub use table::{format_subscriber_rows, SubscriberTableRow};
