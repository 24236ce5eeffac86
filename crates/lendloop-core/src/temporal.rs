//! # Temporal Types — UTC-Only Timestamps
//!
//! Defines `Timestamp`, a UTC-only instant used everywhere in the engine:
//! rental windows, milestone timestamps, and the monotonically increasing
//! `status_updated_at` field.
//!
//! Unlike wall-clock types, `Timestamp` admits no local timezone offset.
//! Inputs with an offset are converted to UTC at the boundary so every
//! stored instant compares consistently. Sub-second precision is kept:
//! the store relies on it to make `status_updated_at` strictly increasing
//! across back-to-back transitions.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A UTC instant.
///
/// # Construction
///
/// - [`Timestamp::now()`] — current UTC time.
/// - [`Timestamp::from_utc()`] — from a `DateTime<Utc>`.
/// - [`Timestamp::parse()`] — from an RFC 3339 string, converting any
///   offset to UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp from the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Parse a timestamp from an RFC 3339 string.
    ///
    /// Offsets are converted to UTC; the stored instant is always UTC.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidTimestamp`] if the string is not valid
    /// RFC 3339.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| CoreError::InvalidTimestamp {
            input: s.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self(dt.with_timezone(&Utc)))
    }

    /// Access the inner `DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Unix epoch timestamp in seconds.
    pub fn epoch_secs(&self) -> i64 {
        self.0.timestamp()
    }

    /// Render as RFC 3339 with Z suffix.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
    }

    /// The later of `self` and one microsecond past `floor`.
    ///
    /// Used by stores to keep `status_updated_at` strictly increasing even
    /// when two transitions commit within the clock's resolution.
    pub fn strictly_after(self, floor: Timestamp) -> Timestamp {
        if self > floor {
            self
        } else {
            Self(floor.0 + Duration::microseconds(1))
        }
    }

    /// Shift the timestamp by a `chrono::Duration`. Test and scheduling
    /// helper; saturates on overflow.
    pub fn offset(self, delta: Duration) -> Timestamp {
        Self(self.0.checked_add_signed(delta).unwrap_or(self.0))
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
