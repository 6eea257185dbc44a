//! # Wall Clock Abstraction
//!
//! Poll windows, correlation timestamps and snapshot ages are all expressed in the foreign
//! store's wall-clock time. Components take an `Arc<dyn Clock>` so tests can pin and advance
//! it; inter-tick delays and correlation deadlines run on tokio's timer, which tests control
//! with `tokio::time::pause` / `advance`.

use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::time::Duration;

/// Source of "now" for every windowing decision
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Manually driven clock for deterministic tests and replays
#[derive(Debug)]
pub struct ManualClock {
    current: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            current: Mutex::new(start),
        }
    }

    /// Clock pinned at the given number of milliseconds past the Unix epoch
    pub fn at_millis(millis: i64) -> Self {
        Self::new(from_millis(millis))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.current.lock() = at;
    }

    pub fn set_millis(&self, millis: i64) {
        self.set(from_millis(millis));
    }

    pub fn advance(&self, by: Duration) {
        let mut current = self.current.lock();
        if let Some(next) = current.checked_add_signed(to_chrono(by)) {
            *current = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

/// Timestamp `millis` milliseconds past the Unix epoch
pub fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Saturating conversion from a std duration into a chrono duration
pub fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or(ChronoDuration::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::at_millis(1_000);
        assert_eq!(clock.now().timestamp_millis(), 1_000);

        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.now().timestamp_millis(), 1_500);

        clock.set_millis(31_000);
        assert_eq!(clock.now().timestamp_millis(), 31_000);
    }

    #[test]
    fn test_to_chrono_saturates() {
        assert_eq!(to_chrono(Duration::from_secs(15)).num_seconds(), 15);
        assert_eq!(to_chrono(Duration::MAX), ChronoDuration::MAX);
    }
}
