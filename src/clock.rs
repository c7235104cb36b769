//! Time Sources
//!
//! The deleter never reads the wall clock directly. It asks a [`Clock`],
//! which lets tests and demos move "now" by hand.
//!
//! Timestamps inside the liveness table are plain `i64` nanoseconds since
//! the Unix epoch; [`unix_nanos`] does the conversion.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of "current time".
pub trait Clock: Debug + Send + Sync {
    /// Returns the current time.
    fn now(&self) -> SystemTime;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    #[inline]
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that only moves when told to.
///
/// # Example
///
/// ```
/// use sweepkv::clock::{unix_nanos, Clock, ManualClock};
/// use std::time::Duration;
///
/// let clock = ManualClock::from_unix_nanos(1_000);
/// clock.advance(Duration::from_nanos(500));
/// assert_eq!(unix_nanos(clock.now()), 1_500);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    nanos: AtomicI64,
}

impl ManualClock {
    /// Creates a clock frozen at `now`.
    pub fn new(now: SystemTime) -> Self {
        Self::from_unix_nanos(unix_nanos(now))
    }

    /// Creates a clock frozen at `nanos` nanoseconds since the Unix epoch.
    pub fn from_unix_nanos(nanos: i64) -> Self {
        Self {
            nanos: AtomicI64::new(nanos),
        }
    }

    /// Jumps to `nanos` nanoseconds since the Unix epoch.
    pub fn set_unix_nanos(&self, nanos: i64) {
        self.nanos.store(nanos, Ordering::SeqCst);
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: Duration) {
        self.nanos.fetch_add(duration_nanos(by), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> SystemTime {
        let nanos = self.nanos.load(Ordering::SeqCst);
        if nanos >= 0 {
            UNIX_EPOCH + Duration::from_nanos(nanos as u64)
        } else {
            UNIX_EPOCH - Duration::from_nanos(nanos.unsigned_abs())
        }
    }
}

/// Converts a point in time to nanoseconds since the Unix epoch.
///
/// Times before the epoch come out negative. Values that do not fit in an
/// `i64` (roughly 292 years either side of 1970) saturate.
pub fn unix_nanos(at: SystemTime) -> i64 {
    match at.duration_since(UNIX_EPOCH) {
        Ok(since) => duration_nanos(since),
        Err(before) => duration_nanos(before.duration()).saturating_neg(),
    }
}

/// Converts a duration to whole nanoseconds, saturating at `i64::MAX`.
#[inline]
pub fn duration_nanos(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unix_nanos_round_trips_through_manual_clock() {
        let clock = ManualClock::from_unix_nanos(9_999);
        assert_eq!(unix_nanos(clock.now()), 9_999);

        clock.set_unix_nanos(-42);
        assert_eq!(unix_nanos(clock.now()), -42);
    }

    #[test]
    fn test_advance() {
        let clock = ManualClock::from_unix_nanos(0);
        clock.advance(Duration::from_secs(2));
        assert_eq!(unix_nanos(clock.now()), 2_000_000_000);
    }

    #[test]
    fn test_duration_nanos_saturates() {
        assert_eq!(duration_nanos(Duration::MAX), i64::MAX);
        assert_eq!(duration_nanos(Duration::from_micros(3)), 3_000);
    }

    #[test]
    fn test_system_clock_is_after_epoch() {
        assert!(unix_nanos(SystemClock.now()) > 0);
    }
}
