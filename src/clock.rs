// Day/week boundaries. Nothing here reads the wall clock; callers pass
// the instant and the IANA timezone explicitly.

use chrono::{DateTime, Datelike, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use spacetimedb::Timestamp;

use crate::error::{EngineError, Result};

/// Zone given to profiles that never picked one
pub const DEFAULT_TIMEZONE: &str = "UTC";

/// "Now" plus the IANA zone in which "today" is evaluated
#[derive(Debug, Clone, Copy)]
pub struct DayClock {
    pub now: Timestamp,
    pub tz: Tz,
}

impl DayClock {
    pub fn new(now: Timestamp, tz: Tz) -> Self {
        Self { now, tz }
    }

    pub fn utc(now: Timestamp) -> Self {
        Self { now, tz: Tz::UTC }
    }

    /// Build from a stored zone name; unknown names fall back to UTC
    pub fn for_zone(now: Timestamp, name: &str) -> Self {
        Self { now, tz: parse_timezone(name).unwrap_or(Tz::UTC) }
    }

    /// Calendar date at `now` in this clock's zone, DST included
    pub fn today(&self) -> NaiveDate {
        to_utc(self.now).with_timezone(&self.tz).date_naive()
    }
}

/// IANA zone name such as "Asia/Kolkata" or "America/New_York"
pub fn parse_timezone(name: &str) -> Result<Tz> {
    let name = name.trim();
    name.parse::<Tz>()
        .map_err(|_| EngineError::InvalidInput(format!("unknown timezone {:?}", name)))
}

pub fn to_utc(ts: Timestamp) -> DateTime<Utc> {
    let micros = ts.to_micros_since_unix_epoch();
    Utc.timestamp_opt(micros.div_euclid(1_000_000), (micros.rem_euclid(1_000_000) * 1_000) as u32)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

pub fn from_utc(dt: DateTime<Utc>) -> Timestamp {
    Timestamp::from_micros_since_unix_epoch(dt.timestamp_micros())
}

/// Storage key for a calendar date
pub fn day_key(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

pub fn parse_day_key(key: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(key, "%Y-%m-%d")
        .map_err(|e| EngineError::InvalidInput(format!("bad date key {:?}: {}", key, e)))
}

pub fn previous_day(date: NaiveDate) -> NaiveDate {
    date.pred_opt().unwrap_or(date)
}

/// UTC calendar day of an instant, used to bucket audit events
pub fn utc_day_key(ts: Timestamp) -> String {
    day_key(to_utc(ts).date_naive())
}

/// Monday 00:00 UTC of the week containing `now`
pub fn week_start_utc(now: Timestamp) -> Timestamp {
    let dt = to_utc(now);
    let monday = dt.date_naive() - Duration::days(dt.weekday().num_days_from_monday() as i64);
    let start = monday.and_hms_opt(0, 0, 0).map(|naive| Utc.from_utc_datetime(&naive));
    start.map(from_utc).unwrap_or(now)
}
