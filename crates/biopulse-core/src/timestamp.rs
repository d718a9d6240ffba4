//! Monotonic timestamps for sample timing
//!
//! Timestamps count nanoseconds from the start of acquisition, not from the
//! Unix epoch: the processing core only ever needs differences between
//! beats, and a device clock that starts at zero keeps them exact.

use crate::error::{BpError, BpResult};
use core::fmt;
use core::ops::{Add, Sub};
use serde::{Deserialize, Serialize};

/// Point in time relative to the start of acquisition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Timestamp {
    /// Nanoseconds since acquisition start
    nanos: u64,
}

impl Timestamp {
    /// Acquisition start
    pub const ZERO: Timestamp = Timestamp { nanos: 0 };

    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self { nanos: micros * 1_000 }
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self { nanos: millis * 1_000_000 }
    }

    /// Timestamp of the `index`-th sample of a stream sampled at `sample_rate` Hz.
    ///
    /// Computed from the index rather than accumulated, so long runs do not
    /// drift by rounding the sample period.
    pub fn from_sample_index(index: u64, sample_rate: f32) -> Self {
        let nanos = (index as f64 * 1_000_000_000.0 / sample_rate as f64).round() as u64;
        Self { nanos }
    }

    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.nanos / 1_000
    }

    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Fractional seconds
    #[inline]
    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }

    /// Calculate duration since an earlier timestamp
    #[inline]
    pub fn duration_since(&self, earlier: Timestamp) -> BpResult<Duration> {
        self.checked_duration_since(earlier)
            .ok_or(BpError::InvalidTimestamp {
                reason: "timestamp is earlier than reference",
            })
    }

    /// Like [`Timestamp::duration_since`], returning `None` when `earlier` is later
    #[inline]
    pub fn checked_duration_since(&self, earlier: Timestamp) -> Option<Duration> {
        self.nanos.checked_sub(earlier.nanos).map(Duration::from_nanos)
    }

    /// Add a duration to this timestamp
    #[inline]
    pub fn add_duration(&self, duration: Duration) -> BpResult<Timestamp> {
        self.nanos
            .checked_add(duration.as_nanos())
            .map(Timestamp::from_nanos)
            .ok_or(BpError::InvalidTimestamp {
                reason: "timestamp overflow",
            })
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.nanos / 1_000_000_000;
        let millis = (self.nanos % 1_000_000_000) / 1_000_000;
        write!(f, "{}.{:03}s", secs, millis)
    }
}

/// Duration type with nanosecond precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Duration {
    nanos: u64,
}

impl Duration {
    #[inline]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self { nanos }
    }

    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self { nanos: micros * 1_000 }
    }

    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Self { nanos: millis * 1_000_000 }
    }

    /// Duration from fractional milliseconds, rounded to the nearest nanosecond
    pub fn from_millis_f32(millis: f32) -> Self {
        Self {
            nanos: (millis.max(0.0) as f64 * 1_000_000.0).round() as u64,
        }
    }

    #[inline]
    pub const fn as_nanos(&self) -> u64 {
        self.nanos
    }

    #[inline]
    pub const fn as_micros(&self) -> u64 {
        self.nanos / 1_000
    }

    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.nanos / 1_000_000
    }

    /// Fractional milliseconds, the unit RR intervals are reported in
    #[inline]
    pub fn as_millis_f32(&self) -> f32 {
        (self.nanos as f64 / 1_000_000.0) as f32
    }

    #[inline]
    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / 1_000_000_000.0
    }
}

impl Add for Duration {
    type Output = Duration;

    #[inline]
    fn add(self, other: Duration) -> Duration {
        Duration::from_nanos(self.nanos + other.nanos)
    }
}

impl Sub for Duration {
    type Output = Duration;

    #[inline]
    fn sub(self, other: Duration) -> Duration {
        Duration::from_nanos(self.nanos - other.nanos)
    }
}

impl From<std::time::Duration> for Duration {
    fn from(value: std::time::Duration) -> Self {
        Duration::from_nanos(value.as_nanos() as u64)
    }
}

impl From<Duration> for std::time::Duration {
    fn from(value: Duration) -> Self {
        std::time::Duration::from_nanos(value.nanos)
    }
}
