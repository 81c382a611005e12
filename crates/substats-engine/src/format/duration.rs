//! Duration buckets: days below 30, months below 365, years above.
//!
//! A month is 30 days and a year 365. Unit words are always plural
//! ("1 months", "1 years, 1 months") so dashboard, email, and drop-off
//! strings read the same.

const DAYS_PER_MONTH: i64 = 30;
const DAYS_PER_YEAR: i64 = 365;

/// Shown when no cancelled subscription has a usable start/cancel pair
pub const NO_DROPOFF_DATA: &str = "No cancellation data available";

/// Render a day count as a human-readable duration
pub fn format_duration(days: i64) -> String {
    if days < DAYS_PER_MONTH {
        format!("{} days", days)
    } else if days < DAYS_PER_YEAR {
        let months = days / DAYS_PER_MONTH;
        let remaining_days = days % DAYS_PER_MONTH;
        if remaining_days > 0 {
            format!("{} months, {} days", months, remaining_days)
        } else {
            format!("{} months", months)
        }
    } else {
        let years = days / DAYS_PER_YEAR;
        let months = (days % DAYS_PER_YEAR) / DAYS_PER_MONTH;
        if months > 0 {
            format!("{} years, {} months", years, months)
        } else {
            format!("{} years", years)
        }
    }
}

/// Render a drop-off period with the number of customers sharing it
pub fn format_dropoff_period(days: i64, customers: usize) -> String {
    format!("{} ({} customers)", format_duration(days), customers)
}
