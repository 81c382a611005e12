//! Weekly report trigger
//!
//! First run at the next Monday 09:00 UTC, then every 7 days.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use std::sync::Arc;
use substats_common::Clock;
use substats_engine::AnalyticsService;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Hour of day (UTC) the weekly report goes out
pub const REPORT_HOUR: u32 = 9;

/// Next Monday at 09:00 UTC strictly after `now`'s date.
///
/// On a Monday this is the following Monday.
pub fn next_weekly_run(now: DateTime<Utc>) -> DateTime<Utc> {
    let days_ahead = 7 - i64::from(now.weekday().num_days_from_monday());
    let date = now.date_naive() + Duration::days(days_ahead);
    let time = NaiveTime::from_hms_opt(REPORT_HOUR, 0, 0).unwrap_or(NaiveTime::MIN);
    date.and_time(time).and_utc()
}

/// Spawn the weekly report loop
pub fn spawn_weekly_reports(service: Arc<AnalyticsService>, clock: Clock) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut next_run = next_weekly_run(clock.now());
        info!(next_run = %next_run, "Weekly report scheduled");

        loop {
            let wait = (next_run - clock.now()).to_std().unwrap_or_default();
            tokio::time::sleep(wait).await;

            if let Err(e) = service.weekly_report_job().await {
                error!(error = %e, "Weekly report failed");
            }

            next_run = next_run + Duration::days(7);
            info!(next_run = %next_run, "Weekly report scheduled");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Weekday};

    #[test]
    fn test_next_monday() {
        // Wednesday
        let now = Utc.with_ymd_and_hms(2024, 3, 6, 15, 30, 0).unwrap();
        assert_eq!(next_weekly_run(now), Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap());

        // Sunday night
        let now = Utc.with_ymd_and_hms(2024, 3, 10, 23, 0, 0).unwrap();
        assert_eq!(next_weekly_run(now), Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_monday_goes_to_following_week() {
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap();
        let next = next_weekly_run(now);
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 11, 9, 0, 0).unwrap());
        assert_eq!(next.weekday(), Weekday::Mon);
    }
}
