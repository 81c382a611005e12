//! Display rows for the top-subscriber table

use super::email::format_email_address;
use serde::{Deserialize, Serialize};
use substats_common::SubscriberRow;

/// A subscriber row with every column rendered for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriberTableRow {
    pub customer_id: String,
    pub email: String,
    pub signup_date: String,
    pub duration: String,
    pub total_value: String,
}

impl From<&SubscriberRow> for SubscriberTableRow {
    fn from(row: &SubscriberRow) -> Self {
        Self {
            customer_id: row.customer_id.clone(),
            email: format_email_address(&row.email),
            signup_date: row.signup_date.format("%-d %B %Y").to_string(),
            duration: format!("{} days", row.duration_days),
            total_value: format!("${:.2}", row.total_value),
        }
    }
}

/// Render a whole table, preserving order
pub fn format_subscriber_rows(rows: &[SubscriberRow]) -> Vec<SubscriberTableRow> {
    rows.iter().map(SubscriberTableRow::from).collect()
}
