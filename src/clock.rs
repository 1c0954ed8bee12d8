//! Tick sources.
//!
//! The dedup cache never reads time itself; the coordinator asks a [`Clock`]
//! and passes ticks down. Ticks are milliseconds, the same unit as
//! `cache_max_age_ms`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Millisecond timestamp.
pub type Tick = u64;

/// Monotonic tick source.
pub trait Clock: Send + Sync {
    /// Returns the current tick.
    fn now(&self) -> Tick;
}

/// Milliseconds elapsed since the clock was created.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a clock starting at tick 0.
    #[must_use]
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Tick {
        duration_to_ticks(self.origin.elapsed())
    }
}

/// Settable clock for tests and replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    tick: AtomicU64,
}

impl ManualClock {
    /// Creates a clock reading `tick`.
    #[must_use]
    pub const fn new(tick: Tick) -> Self {
        Self {
            tick: AtomicU64::new(tick),
        }
    }

    /// Moves the clock to `tick`.
    pub fn set(&self, tick: Tick) {
        self.tick.store(tick, Ordering::SeqCst);
    }

    /// Advances the clock by `delta` ticks and returns the new reading.
    pub fn advance(&self, delta: Tick) -> Tick {
        self.tick.fetch_add(delta, Ordering::SeqCst) + delta
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        self.tick.load(Ordering::SeqCst)
    }
}

/// Converts a duration to ticks, saturating at `Tick::MAX`.
#[inline]
#[must_use]
pub fn duration_to_ticks(duration: Duration) -> Tick {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(10);
        assert_eq!(clock.now(), 10);
        assert_eq!(clock.advance(5), 15);
        clock.set(3);
        assert_eq!(clock.now(), 3);
    }

    #[test]
    fn test_monotonic_clock_never_goes_back() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        std::thread::sleep(Duration::from_millis(5));
        assert!(clock.now() >= first);
    }

    #[test]
    fn test_duration_to_ticks_saturates() {
        assert_eq!(duration_to_ticks(Duration::from_secs(2)), 2000);
        assert_eq!(duration_to_ticks(Duration::MAX), u64::MAX);
    }
}
