//! Invoice records as returned by the billing API

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Invoice status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Open,
    Paid,
    Uncollectible,
    Void,
    #[serde(other)]
    Other,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Open => "open",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Uncollectible => "uncollectible",
            InvoiceStatus::Void => "void",
            InvoiceStatus::Other => "other",
        }
    }
}

/// An invoice record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub id: String,
    /// Billed customer ID
    pub customer: String,
    pub status: InvoiceStatus,
    /// Amount paid in minor currency units (cents)
    pub amount_paid: i64,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created: DateTime<Utc>,
}

impl InvoiceRecord {
    /// Amount paid in major currency units
    pub fn amount_paid_major(&self) -> Decimal {
        minor_to_major(self.amount_paid)
    }
}

/// Convert minor currency units to a 2-decimal major amount
pub fn minor_to_major(amount: i64) -> Decimal {
    Decimal::new(amount, 2)
}
