use std::str::FromStr;
use chrono::{DateTime, Utc};

use crate::errors::{Result, TleError};

// ---------- Constants ----------
pub const JD_UNIX_EPOCH: f64 = 2_440_587.5;   // 1970-01-01 00:00 UTC
pub const JD_J2000: f64 = 2_451_545.0;        // 2000-01-01 12:00 UTC (sgp4 epoch origin)

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const MILLIS_PER_DAY: f64 = 86_400_000.0;
pub const MINUTES_PER_DAY: f64 = 1_440.0;

const DAYS_PER_JULIAN_YEAR: f64 = 365.25;

// ---------- Calendar conversions ----------

/// Julian Day Number of a Gregorian calendar date (the JD at noon of that day).
pub fn julian_day_number(year: i32, month: u32, day: u32) -> i64 {
    let a = (14 - month as i64) / 12;
    let y = year as i64 + 4800 - a;
    let m = month as i64 + 12*a - 3;
    day as i64 + (153*m + 2)/5 + 365*y + y/4 - y/100 + y/400 - 32045
}

/// Julian Date at 00:00 UTC of a Gregorian calendar date.
pub fn julian_date_at_midnight(year: i32, month: u32, day: u32) -> f64 {
    julian_day_number(year, month, day) as f64 - 0.5
}

pub fn julian_date_from_unix_millis(millis: i64) -> f64 {
    millis as f64 / MILLIS_PER_DAY + JD_UNIX_EPOCH
}

pub fn unix_seconds_from_julian_date(jd: f64) -> f64 {
    (jd - JD_UNIX_EPOCH) * SECONDS_PER_DAY
}

pub fn unix_millis_from_julian_date(jd: f64) -> i64 {
    ((jd - JD_UNIX_EPOCH) * MILLIS_PER_DAY).round() as i64
}

/// the epoch argument the sgp4 crate expects
pub fn julian_years_since_j2000(jd: f64) -> f64 {
    (jd - JD_J2000) / DAYS_PER_JULIAN_YEAR
}

// ---------- Time input ----------

/// A propagation time, resolved to a Julian Date at the call boundary.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeInput {
    JulianDate(f64),
    EpochMillis(i64),   // milliseconds since 1970-01-01 00:00 UTC
}

impl TimeInput {
    pub fn julian_date(&self) -> Result<f64> {
        match *self {
            TimeInput::JulianDate(jd) if jd.is_finite() => Ok(jd),
            TimeInput::JulianDate(jd) => Err(TleError::InvalidTimeInput(format!("non-finite Julian Date {jd}"))),
            TimeInput::EpochMillis(millis) => Ok(julian_date_from_unix_millis(millis)),
        }
    }
}

impl From<f64> for TimeInput {
    fn from(jd: f64) -> Self { TimeInput::JulianDate(jd) }
}

impl From<i64> for TimeInput {
    fn from(millis: i64) -> Self { TimeInput::EpochMillis(millis) }
}

impl From<DateTime<Utc>> for TimeInput {
    fn from(dt: DateTime<Utc>) -> Self { TimeInput::EpochMillis(dt.timestamp_millis()) }
}

/// accepts either a plain number (Julian Date) or an RFC 3339 timestamp
impl FromStr for TimeInput {
    type Err = TleError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Ok(jd) = s.parse::<f64>() {
            if !jd.is_finite() {
                return Err(TleError::InvalidTimeInput(format!("non-finite Julian Date '{s}'")));
            }
            return Ok(TimeInput::JulianDate(jd));
        }
        DateTime::parse_from_rfc3339(s)
            .map(|dt| TimeInput::EpochMillis(dt.timestamp_millis()))
            .map_err(|e| TleError::InvalidTimeInput(format!("'{s}' is neither a Julian Date nor a timestamp: {e}")))
    }
}
