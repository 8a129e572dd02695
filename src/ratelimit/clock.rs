//! Time sources for window selection.
//!
//! Counters are keyed by the local hour of day and day of month, so the only
//! thing the limiter needs from a clock is that pair. Keeping it behind a
//! trait lets tests move across window boundaries deterministically.

use std::sync::Arc;

use chrono::{Datelike, Duration, Local, NaiveDateTime, Timelike};
use parking_lot::Mutex;

/// The point in time an evaluation is pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowInstant {
    /// Hour of day, 0-23.
    pub hour_of_day: u32,
    /// Day of month, 1-31.
    pub day_of_month: u32,
}

impl WindowInstant {
    /// Extract the window coordinates from any calendar timestamp.
    pub fn from_datetime<T: Datelike + Timelike>(time: &T) -> Self {
        Self {
            hour_of_day: time.hour(),
            day_of_month: time.day(),
        }
    }
}

/// A time source used by the rate limiter.
pub trait Clock: Send + Sync {
    /// Returns the current window coordinates.
    fn now(&self) -> WindowInstant;
}

/// Wall-clock time in the process' local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> WindowInstant {
        WindowInstant::from_datetime(&Local::now())
    }
}

/// A manually driven clock.
///
/// Clones share the same time, so a test can hand one clone to the limiter
/// and keep another to advance it.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<NaiveDateTime>>,
}

impl ManualClock {
    /// Create a clock fixed at the given local time.
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, time: NaiveDateTime) {
        *self.now.lock() = time;
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// The current time of this clock.
    pub fn current(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> WindowInstant {
        WindowInstant::from_datetime(&*self.now.lock())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(day: u32, hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2015, 2, day)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    #[test]
    fn test_manual_clock_reports_hour_and_day() {
        let clock = ManualClock::new(at(3, 11, 1));
        assert_eq!(
            clock.now(),
            WindowInstant {
                hour_of_day: 11,
                day_of_month: 3
            }
        );
    }

    #[test]
    fn test_manual_clock_advance_crosses_boundaries() {
        let clock = ManualClock::new(at(3, 23, 45));
        let shared = clock.clone();

        shared.advance(Duration::minutes(30));

        assert_eq!(clock.now().hour_of_day, 0);
        assert_eq!(clock.now().day_of_month, 4);
    }

    #[test]
    fn test_manual_clock_set() {
        let clock = ManualClock::new(at(3, 11, 1));
        clock.set(at(28, 5, 0));
        assert_eq!(clock.current(), at(28, 5, 0));
        assert_eq!(clock.now().day_of_month, 28);
    }

    #[test]
    fn test_system_clock_is_in_range() {
        let now = SystemClock.now();
        assert!(now.hour_of_day < 24);
        assert!((1..=31).contains(&now.day_of_month));
    }
}
