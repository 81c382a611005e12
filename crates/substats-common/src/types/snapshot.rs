//! Derived analytics values: the metrics snapshot and subscriber rows

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Computed dashboard metrics.
///
/// Every metric is optional: `None` means the metric could not be computed
/// (its remote aggregation failed) and must be shown as unavailable, never
/// replaced with a made-up number.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Currently active subscriptions
    pub active_count: Option<u64>,
    /// Active subscriptions created at least 90 days ago
    pub original_active: Option<u64>,
    /// round(active / (active + cancelled) * 100), 0 when both are zero
    pub retention_rate: Option<u32>,
    /// Mean age of active subscriptions in whole days
    pub avg_duration_days: Option<i64>,
    /// Active subscriptions created in the trailing 7 days
    pub new_this_week: Option<u64>,
    /// Subscriptions canceled in the trailing 7 days
    pub cancelled_this_week: Option<u64>,
    /// Active customers with at least one canceled subscription
    pub returning_count: Option<u64>,
    /// All canceled subscriptions
    pub total_cancelled: Option<u64>,
    /// Formatted most common drop-off period
    pub common_dropoff: Option<String>,
    /// When the snapshot was computed
    pub last_updated: DateTime<Utc>,
}

impl MetricsSnapshot {
    /// Snapshot with every metric unavailable
    pub fn unavailable(at: DateTime<Utc>) -> Self {
        Self {
            active_count: None,
            original_active: None,
            retention_rate: None,
            avg_duration_days: None,
            new_this_week: None,
            cancelled_this_week: None,
            returning_count: None,
            total_cancelled: None,
            common_dropoff: None,
            last_updated: at,
        }
    }

    /// Names of metrics that could not be computed
    pub fn unavailable_metrics(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.active_count.is_none() {
            missing.push("active_count");
        }
        if self.original_active.is_none() {
            missing.push("original_active");
        }
        if self.retention_rate.is_none() {
            missing.push("retention_rate");
        }
        if self.avg_duration_days.is_none() {
            missing.push("avg_duration_days");
        }
        if self.new_this_week.is_none() {
            missing.push("new_this_week");
        }
        if self.cancelled_this_week.is_none() {
            missing.push("cancelled_this_week");
        }
        if self.returning_count.is_none() {
            missing.push("returning_count");
        }
        if self.total_cancelled.is_none() {
            missing.push("total_cancelled");
        }
        if self.common_dropoff.is_none() {
            missing.push("common_dropoff");
        }
        missing
    }

    pub fn is_complete(&self) -> bool {
        self.unavailable_metrics().is_empty()
    }
}

/// Retention rate as a whole percentage in 0..=100
pub fn retention_rate(active: u64, cancelled: u64) -> u32 {
    let total = active + cancelled;
    if total == 0 {
        return 0;
    }
    ((active as f64 / total as f64) * 100.0).round() as u32
}

/// One row of the top-subscriber table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriberRow {
    pub customer_id: String,
    pub email: String,
    pub signup_date: NaiveDate,
    pub duration_days: i64,
    /// Sum of recent paid invoices, major currency units
    pub total_value: Decimal,
}

/// A customer ranked by lifetime paid value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerValue {
    pub customer_id: String,
    pub email: String,
    pub start_date: Option<NaiveDate>,
    pub total_value: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retention_rate_bounds() {
        assert_eq!(retention_rate(0, 0), 0);
        assert_eq!(retention_rate(10, 0), 100);
        assert_eq!(retention_rate(0, 10), 0);
        assert_eq!(retention_rate(2, 1), 67);
        assert_eq!(retention_rate(1, 2), 33);
        assert_eq!(retention_rate(798, 430), 65);

        for active in 0..40u64 {
            for cancelled in 0..40u64 {
                assert!(retention_rate(active, cancelled) <= 100);
            }
        }
    }

    #[test]
    fn test_unavailable_snapshot() {
        let snapshot = MetricsSnapshot::unavailable(Utc::now());
        assert!(!snapshot.is_complete());
        assert_eq!(snapshot.unavailable_metrics().len(), 9);
    }

    #[test]
    fn test_snapshot_serializes_unavailable_as_null() {
        let mut snapshot = MetricsSnapshot::unavailable(Utc::now());
        snapshot.active_count = Some(3);
        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["active_count"], 3);
        assert!(json["returning_count"].is_null());
    }
}
