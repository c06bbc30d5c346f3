//! Canonical business-time clock.
//!
//! Every persisted timestamp and business date is pinned to one fixed civil
//! zone (UTC+3, no DST) so values written on different devices stay
//! comparable. The strings carry no offset suffix and must not be read back
//! as UTC.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Offset of the canonical business zone from UTC, in seconds.
pub const BUSINESS_ZONE_OFFSET_SECS: i32 = 3 * 3600;

/// Format of [`now`] output: second resolution with a fixed `.000` suffix.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000";

fn business_now() -> NaiveDateTime {
    Utc::now().naive_utc() + TimeDelta::seconds(i64::from(BUSINESS_ZONE_OFFSET_SECS))
}

/// Current wall-clock time in the business zone, `YYYY-MM-DDTHH:mm:ss.000`.
pub fn now() -> String {
    business_now().format(TIMESTAMP_FORMAT).to_string()
}

/// Current calendar date in the business zone.
pub fn today() -> NaiveDate {
    business_now().date()
}
