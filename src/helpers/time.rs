use chrono::{DateTime, Datelike, TimeZone, Utc};
use tokio::time::Instant;

/// Source of "now" for token validity checks.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock backed by `chrono::Utc`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub fn get_instant() -> Instant {
    Instant::now()
}

/// Unix timestamps of January 1st 00:00 UTC of `now`'s year and of the next year.
pub fn year_bounds(now: DateTime<Utc>) -> (i64, i64) {
    let year = now.year();
    let start = Utc
        .with_ymd_and_hms(year, 1, 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp())
        .unwrap_or_default();
    let end = Utc
        .with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0)
        .single()
        .map(|d| d.timestamp())
        .unwrap_or(i64::MAX);
    (start, end)
}
