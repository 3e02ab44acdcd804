//! Calendar-aligned window boundaries
//!
//! Every window is evaluated in UTC so that all dimensions queried for a
//! single response share the same boundary.

use chrono::{DateTime, Datelike, Days, NaiveTime, Timelike, Utc};

use crate::analytics::models::WindowMode;

impl WindowMode {
    /// Start of the calendar unit containing `now`, or `None` for `alltime`.
    ///
    /// Weeks start on Monday.
    pub fn start(self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let today = now.date_naive();
        let start = match self {
            WindowMode::AllTime => return None,
            WindowMode::Hour => today.and_hms_opt(now.hour(), 0, 0)?,
            WindowMode::Day => today.and_time(NaiveTime::MIN),
            WindowMode::Week => {
                let back = u64::from(today.weekday().num_days_from_monday());
                today.checked_sub_days(Days::new(back))?.and_time(NaiveTime::MIN)
            }
            WindowMode::Month => today.with_day(1)?.and_time(NaiveTime::MIN),
            WindowMode::Year => today.with_ordinal(1)?.and_time(NaiveTime::MIN),
        };
        Some(start.and_utc())
    }

    /// Inclusive lower bound on event timestamps (Unix seconds)
    pub fn cutoff(self, now: DateTime<Utc>) -> Option<i64> {
        self.start(now).map(|start| start.timestamp())
    }
}
