//! Plain-text report rendering
//!
//! Metrics that could not be computed render as [`UNAVAILABLE`]. The report
//! always renders in full, but a failed metric is visibly marked instead of
//! being filled with a plausible number.

use super::duration::format_duration;
use chrono::{DateTime, Utc};
use std::fmt::Display;
use std::fmt::Write as _;
use substats_common::{CustomerValue, MetricsSnapshot};

/// Placeholder for a metric whose computation failed
pub const UNAVAILABLE: &str = "unavailable";

const RULE: &str = "----------------------------------------";

/// Which report is being rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Weekly,
    Test,
}

impl ReportKind {
    pub fn title(&self) -> &'static str {
        match self {
            ReportKind::Weekly => "STRIPE ANALYTICS WEEKLY REPORT",
            ReportKind::Test => "STRIPE ANALYTICS TEST REPORT",
        }
    }

    pub fn subject(&self, site_name: &str) -> String {
        match self {
            ReportKind::Weekly => format!("Stripe Analytics Weekly Report - {}", site_name),
            ReportKind::Test => format!("Stripe Analytics Test Report - {}", site_name),
        }
    }
}

/// Top-customer section of a report
#[derive(Debug, Clone, Copy)]
pub enum TopCustomers<'a> {
    /// No section
    Omitted,
    /// Section present, ranking could not be computed
    Unavailable,
    Listed(&'a [CustomerValue]),
}

/// Everything besides the snapshot that goes into a report
#[derive(Debug, Clone)]
pub struct ReportContext<'a> {
    pub kind: ReportKind,
    pub generated_at: DateTime<Utc>,
    pub dashboard_url: &'a str,
    pub top_customers: TopCustomers<'a>,
}

fn or_unavailable<T: Display>(value: Option<T>) -> String {
    value.map_or_else(|| UNAVAILABLE.to_string(), |v| v.to_string())
}

/// Render the report body
pub fn format_email_body(snapshot: &MetricsSnapshot, ctx: &ReportContext<'_>) -> String {
    let retention = snapshot
        .retention_rate
        .map_or_else(|| UNAVAILABLE.to_string(), |rate| format!("{}%", rate));
    let avg_duration = snapshot
        .avg_duration_days
        .map_or_else(|| UNAVAILABLE.to_string(), format_duration);
    let dropoff = snapshot.common_dropoff.as_deref().unwrap_or(UNAVAILABLE);

    let mut body = String::new();
    let _ = writeln!(body, "**{}**", ctx.kind.title());
    let _ = writeln!(body, "Generated: {}", ctx.generated_at.format("%B %-d, %Y %-I:%M %P"));
    let _ = writeln!(body, "{}\n", RULE);

    let _ = writeln!(body, "**SUBSCRIPTION OVERVIEW**");
    let _ = writeln!(body, "Active Subscribers: {}", or_unavailable(snapshot.active_count));
    let _ = writeln!(
        body,
        "Original Active Subscribers: {}",
        or_unavailable(snapshot.original_active)
    );
    let _ = writeln!(body, "Returning Subscribers: {}", or_unavailable(snapshot.returning_count));
    let _ = writeln!(body, "Total Cancelled: {}", or_unavailable(snapshot.total_cancelled));
    let _ = writeln!(body, "Current Retention Rate: {}\n", retention);

    let _ = writeln!(body, "**WEEKLY CHANGES**");
    let _ = writeln!(body, "New Subscriptions: {}", or_unavailable(snapshot.new_this_week));
    let _ = writeln!(body, "Cancellations: {}\n", or_unavailable(snapshot.cancelled_this_week));

    let _ = writeln!(body, "**SUBSCRIBER ACTIVITY**");
    let _ = writeln!(body, "Average Subscription Length: {}", avg_duration);
    let _ = writeln!(body, "Most Common Drop-off Period: {}\n", dropoff);

    match ctx.top_customers {
        TopCustomers::Omitted => {}
        TopCustomers::Unavailable => {
            let _ = writeln!(body, "**TOP CUSTOMERS**");
            let _ = writeln!(body, "{}\n", UNAVAILABLE);
        }
        TopCustomers::Listed(customers) => {
            let _ = writeln!(body, "**TOP CUSTOMERS**");
            let _ = writeln!(body, "{}", format_top_customers(customers));
        }
    }

    let _ = writeln!(body, "{}", RULE);
    let _ = writeln!(body, "View detailed analytics: {}\n", ctx.dashboard_url);
    body.push_str(
        "To modify your email preferences, \
         visit the Stripe Analytics settings in your dashboard.",
    );
    body
}

/// Numbered top-customer list
pub fn format_top_customers(customers: &[CustomerValue]) -> String {
    if customers.is_empty() {
        return "No customer data available\n".to_string();
    }

    let mut out = String::new();
    for (index, customer) in customers.iter().enumerate() {
        let since = customer
            .start_date
            .map_or_else(|| "N/A".to_string(), |d| d.format("%Y-%m-%d").to_string());
        let _ = writeln!(out, "{}. {} (Since {})", index + 1, customer.email, since);
        let _ = writeln!(out, "   Total Value: ${:.2}", customer.total_value);
    }
    out
}

/// Shorten long addresses for table display.
///
/// Addresses over 30 characters whose local part exceeds 20 characters keep
/// the first 17 characters of the local part, then `...@domain`.
pub fn format_email_address(email: &str) -> String {
    if email.chars().count() <= 30 {
        return email.to_string();
    }

    let mut parts = email.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) if local.chars().count() > 20 => {
            let head: String = local.chars().take(17).collect();
            format!("{}...@{}", head, domain)
        }
        _ => email.to_string(),
    }
}
