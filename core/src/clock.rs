//! Time sources for circuit breakers and rate limiters
//!
//! Both primitives read time exclusively through [`Clock`]:
//! - `MonotonicClock`: `Instant`-anchored seconds, real thread sleeps
//! - `ManualClock`: caller-driven time for tests and simulations
//!
//! Timestamps are seconds since the clock was created. They never jump when
//! the wall clock is adjusted by NTP.

use parking_lot::Mutex;
use std::time::{Duration, Instant};

/// Abstract time source
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in seconds on this clock's monotonic scale
    fn now(&self) -> f64;

    /// Block the calling thread for `secs` seconds
    fn sleep(&self, secs: f64);
}

/// Monotonic wall time anchored at construction
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    start_time: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    fn sleep(&self, secs: f64) {
        if let Some(duration) = sleep_duration(secs) {
            std::thread::sleep(duration);
        }
    }
}

/// Convert seconds to a sleep duration; `None` for non-positive or NaN,
/// saturating at `Duration::MAX`
fn sleep_duration(secs: f64) -> Option<Duration> {
    if secs.is_nan() || secs <= 0.0 {
        return None;
    }
    Some(Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX))
}

/// Clock that only moves when told to
///
/// `sleep` advances the clock by the requested amount and returns at once,
/// so code that waits on a `ManualClock` observes exactly the time it asked
/// to wait.
///
/// # Example
///
/// ```rust
/// use quota_guard::{Clock, ManualClock};
///
/// let clock = ManualClock::new();
/// clock.advance(1.5);
/// clock.sleep(0.5);
/// assert_eq!(clock.now(), 2.0);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Mutex<f64>,
}

impl ManualClock {
    /// Create a clock reading 0.0
    pub fn new() -> Self {
        Self::starting_at(0.0)
    }

    pub fn starting_at(secs: f64) -> Self {
        Self {
            now: Mutex::new(secs),
        }
    }

    /// Move time forward by `secs` (negative values are ignored)
    pub fn advance(&self, secs: f64) {
        if secs > 0.0 {
            *self.now.lock() += secs;
        }
    }

    /// Jump to an absolute reading; the clock never moves backwards
    pub fn set(&self, secs: f64) {
        let mut now = self.now.lock();
        if secs > *now {
            *now = secs;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> f64 {
        *self.now.lock()
    }

    fn sleep(&self, secs: f64) {
        self.advance(secs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotonic_clock_moves_forward() {
        let clock = MonotonicClock::new();

        let time1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let time2 = clock.now();

        assert!(time2 > time1);
    }

    #[test]
    fn test_monotonic_clock_sleep_blocks() {
        let clock = MonotonicClock::new();

        let before = clock.now();
        clock.sleep(0.02);

        assert!(clock.now() - before >= 0.02);
    }

    #[test]
    fn test_monotonic_clock_ignores_non_positive_sleep() {
        let clock = MonotonicClock::new();
        clock.sleep(-1.0);
        clock.sleep(0.0);
        clock.sleep(f64::NAN);
    }

    #[test]
    fn test_sleep_duration_saturates() {
        assert_eq!(sleep_duration(0.0), None);
        assert_eq!(sleep_duration(-3.0), None);
        assert_eq!(sleep_duration(f64::NAN), None);
        assert_eq!(sleep_duration(0.5), Some(Duration::from_millis(500)));
        assert_eq!(sleep_duration(1e20), Some(Duration::MAX));
        assert_eq!(sleep_duration(f64::INFINITY), Some(Duration::MAX));
    }

    #[test]
    fn test_manual_clock_advance_and_sleep() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), 0.0);

        clock.advance(2.5);
        assert_eq!(clock.now(), 2.5);

        clock.sleep(1.0);
        assert_eq!(clock.now(), 3.5);
    }

    #[test]
    fn test_manual_clock_never_goes_backwards() {
        let clock = ManualClock::starting_at(10.0);

        clock.advance(-5.0);
        clock.set(4.0);
        assert_eq!(clock.now(), 10.0);

        clock.set(12.0);
        assert_eq!(clock.now(), 12.0);
    }
}
