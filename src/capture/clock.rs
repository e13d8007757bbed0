//! Time sources for the monitor.
//!
//! The debounce machine and restart scheduling need a monotonic clock; the
//! statistics aggregator and baseline timestamps need wall-clock time. Both
//! come from one injected [`TimeSource`] so tests can drive them together.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, NaiveDate, Utc};

/// Trait representing the monitor's clock.
pub trait TimeSource: Send + Sync {
    /// Monotonic time used for debounce and backoff
    fn now(&self) -> Instant;

    /// Wall-clock time used for timestamps
    fn utc_now(&self) -> DateTime<Utc>;

    /// Calendar date that statistics are attributed to
    fn today(&self) -> NaiveDate {
        self.utc_now().date_naive()
    }
}

/// Default time source backed by `Instant::now` and `Utc::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Time source that follows the tokio clock.
///
/// Under `tokio::time::pause` the monotonic and wall-clock readings advance
/// together with the paused runtime clock.
pub struct TokioTimeSource {
    origin: tokio::time::Instant,
    origin_utc: DateTime<Utc>,
}

impl TokioTimeSource {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin_utc: DateTime<Utc>) -> Self {
        Self {
            origin: tokio::time::Instant::now(),
            origin_utc,
        }
    }
}

impl Default for TokioTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for TokioTimeSource {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        let elapsed = tokio::time::Instant::now().saturating_duration_since(self.origin);
        self.origin_utc + chrono::Duration::from_std(elapsed).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

/// Manually advanced clock for deterministic tests and simulation.
pub struct ManualTimeSource {
    origin: Instant,
    origin_utc: DateTime<Utc>,
    offset: Mutex<Duration>,
}

impl ManualTimeSource {
    pub fn new() -> Self {
        Self::starting_at(Utc::now())
    }

    pub fn starting_at(origin_utc: DateTime<Utc>) -> Self {
        Self {
            origin: Instant::now(),
            origin_utc,
            offset: Mutex::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ManualTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualTimeSource {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn utc_now(&self) -> DateTime<Utc> {
        self.origin_utc
            + chrono::Duration::from_std(self.elapsed()).unwrap_or_else(|_| chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_manual_clock_advances_both_readings() {
        let start = Utc.with_ymd_and_hms(2024, 1, 31, 23, 59, 59).unwrap();
        let clock = ManualTimeSource::starting_at(start);
        let t0 = clock.now();

        clock.advance(Duration::from_millis(1500));
        assert_eq!(clock.now() - t0, Duration::from_millis(1500));
        assert_eq!(clock.today(), NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemTimeSource::default();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 8, 0, 0).unwrap();
        let clock = TokioTimeSource::starting_at(start);
        let t0 = clock.now();

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(clock.now() - t0, Duration::from_secs(2));
        assert_eq!(clock.utc_now(), start + chrono::Duration::seconds(2));
    }
}
