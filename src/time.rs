//! Millisecond-resolution timestamps and durations.
//!
//! The engine keeps time as plain epoch milliseconds with no timezone
//! semantics.  Calendar conversions exist only at the API boundary, for
//! constructing timestamps from dates and for human-readable display.

use std::fmt::{self, Display};
use std::ops::{Add, AddAssign, Sub};

use chrono::{NaiveDate, NaiveDateTime};

use crate::error::{Error, Result};

/// A point in time, in milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const MIN: Self = Self(i64::MIN);
    pub const MAX: Self = Self(i64::MAX);

    pub const fn from_millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn millis(self) -> i64 {
        self.0
    }

    /// Midnight on the given calendar date (UTC, no timezone attached).
    ///
    /// Fails with [`Error::InvalidArgument`] on dates that do not exist.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        let date = NaiveDate::from_ymd_opt(year, month, day)
            .ok_or_else(|| Error::InvalidArgument(format!("invalid date {year}-{month}-{day}")))?;
        let dt = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
        Ok(Self(dt.and_utc().timestamp_millis()))
    }

    /// The timestamp of the most recent midnight at or before `self`.
    pub fn floor_to_day(self) -> Self {
        Self(self.0.div_euclid(Duration::DAY.0) * Duration::DAY.0)
    }

    fn as_datetime(self) -> Option<NaiveDateTime> {
        chrono::DateTime::from_timestamp_millis(self.0).map(|dt| dt.naive_utc())
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_datetime() {
            Some(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M:%S%.3f")),
            None => write!(f, "{}ms", self.0),
        }
    }
}

impl Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 + rhs.0)
    }
}

impl AddAssign<Duration> for Timestamp {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.0;
    }
}

impl Sub<Duration> for Timestamp {
    type Output = Timestamp;

    fn sub(self, rhs: Duration) -> Timestamp {
        Timestamp(self.0 - rhs.0)
    }
}

impl Sub for Timestamp {
    type Output = Duration;

    fn sub(self, rhs: Timestamp) -> Duration {
        Duration(self.0 - rhs.0)
    }
}

/// A span of time, in milliseconds.  May be negative when produced by
/// timestamp subtraction; durations configuring windows or pulse periods
/// are validated to be positive at node construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Duration(i64);

impl Duration {
    pub const DAY: Self = Self(86_400_000);

    pub const fn millis(millis: i64) -> Self {
        Self(millis)
    }

    pub const fn seconds(seconds: i64) -> Self {
        Self(seconds * 1_000)
    }

    pub const fn minutes(minutes: i64) -> Self {
        Self(minutes * 60_000)
    }

    pub const fn hours(hours: i64) -> Self {
        Self(hours * 3_600_000)
    }

    pub const fn days(days: i64) -> Self {
        Self(days * 86_400_000)
    }

    pub const fn as_millis(self) -> i64 {
        self.0
    }

    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }
}

impl Add for Duration {
    type Output = Duration;

    fn add(self, rhs: Duration) -> Duration {
        Duration(self.0 + rhs.0)
    }
}

impl Display for Duration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn date_roundtrip() {
        let t = Timestamp::from_ymd(2000, 1, 1).unwrap();
        assert_eq!(t.millis(), 946_684_800_000);
        assert_eq!(t.to_string(), "2000-01-01 00:00:00.000");
        assert_eq!(t.floor_to_day(), t);
    }

    #[test]
    fn invalid_date_rejected() {
        assert!(Timestamp::from_ymd(2001, 2, 29).is_err());
    }

    #[test]
    fn arithmetic() {
        let t = Timestamp::from_ymd(2000, 1, 1).unwrap();
        let u = t + Duration::days(3);
        assert_eq!(u, Timestamp::from_ymd(2000, 1, 4).unwrap());
        assert_eq!(u - t, Duration::days(3));
        assert_eq!(Duration::minutes(2), Duration::seconds(120));
    }
}
