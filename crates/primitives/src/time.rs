//! Validated unix timestamps.
use std::{fmt, ops::Sub};

use chrono::{DateTime, TimeZone, Utc};
use eyre::{Result, eyre};
use serde::{Deserialize, Serialize};

/// Seconds since epoch of `3000-01-01T00:00:00Z`.
///
/// Anything above this is almost certainly a millisecond timestamp passed by
/// mistake.
pub const MAX_UNIX_SECONDS: i64 = 32_503_680_000;

/// A non-negative number of seconds since the unix epoch.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "i64", into = "i64")]
pub struct UnixTime(u64);

impl UnixTime {
    /// The unix epoch.
    pub const ZERO: Self = Self(0);

    /// Create a [`UnixTime`], rejecting negative values and values past the year 3000.
    pub fn new(seconds: i64) -> Result<Self> {
        if seconds < 0 {
            return Err(eyre!("unix time must not be negative, got {seconds}"));
        }
        if seconds > MAX_UNIX_SECONDS {
            return Err(eyre!(
                "unix time {seconds} is past the year 3000, was a millisecond value passed?"
            ));
        }
        Ok(Self(seconds as u64))
    }

    /// Create a [`UnixTime`] from a floating point number of seconds, which must be integral.
    pub fn from_f64(seconds: f64) -> Result<Self> {
        if !seconds.is_finite() || seconds.fract() != 0.0 {
            return Err(eyre!("unix time must be an integer, got {seconds}"));
        }
        if seconds < 0.0 || seconds > MAX_UNIX_SECONDS as f64 {
            return Err(eyre!("unix time {seconds} is out of range"));
        }
        Self::new(seconds as i64)
    }

    /// Current wall clock time, truncated to whole seconds.
    pub fn now() -> Self {
        Self(Utc::now().timestamp().max(0) as u64)
    }

    /// Convert a [`DateTime`] into a [`UnixTime`], dropping sub-second precision.
    pub fn from_date(date: DateTime<Utc>) -> Result<Self> {
        Self::new(date.timestamp())
    }

    /// Convert to a UTC date.
    pub fn to_date(self) -> DateTime<Utc> {
        // Always in range: bounded by `MAX_UNIX_SECONDS` at construction.
        Utc.timestamp_opt(self.0 as i64, 0).single().unwrap_or_default()
    }

    /// Number of seconds since the epoch.
    pub const fn as_secs(self) -> u64 {
        self.0
    }

    /// Add `seconds`, failing if the result leaves the valid range.
    pub fn add_secs(self, seconds: u64) -> Result<Self> {
        let secs = self.0.checked_add(seconds).ok_or_else(|| eyre!("unix time overflow"))?;
        Self::new(secs as i64)
    }

    /// Subtract `seconds`, saturating at the epoch.
    pub const fn saturating_sub_secs(self, seconds: u64) -> Self {
        Self(self.0.saturating_sub(seconds))
    }

    /// Round down to a multiple of `granularity` seconds.
    pub const fn floor_to(self, granularity: u64) -> Self {
        if granularity == 0 {
            return self;
        }
        Self(self.0 - self.0 % granularity)
    }

    /// Round down to the start of the hour.
    pub const fn to_start_of_hour(self) -> Self {
        self.floor_to(3600)
    }
}

impl TryFrom<i64> for UnixTime {
    type Error = eyre::Report;

    fn try_from(value: i64) -> Result<Self> {
        Self::new(value)
    }
}

impl TryFrom<u64> for UnixTime {
    type Error = eyre::Report;

    fn try_from(value: u64) -> Result<Self> {
        let value = i64::try_from(value).map_err(|_| eyre!("unix time {value} is out of range"))?;
        Self::new(value)
    }
}

impl From<UnixTime> for i64 {
    fn from(value: UnixTime) -> Self {
        value.0 as Self
    }
}

impl From<UnixTime> for u64 {
    fn from(value: UnixTime) -> Self {
        value.0
    }
}

impl Sub for UnixTime {
    type Output = u64;

    /// Seconds between two timestamps, saturating at zero.
    fn sub(self, rhs: Self) -> u64 {
        self.0.saturating_sub(rhs.0)
    }
}

impl fmt::Display for UnixTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
