//! Monotonic time sources for the timeout registry.

use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Monotonic clock consumed by [`TimeoutRegistry`](super::TimeoutRegistry).
pub trait Clock: Send + Sync + 'static {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Clock backed by the tokio timer.
///
/// Follows tokio's paused time in tests (`start_paused = true`), so it is the
/// clock to use together with [`TimeoutScheduler`](super::TimeoutScheduler).
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually driven clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    pub fn new(start: Instant) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Moves the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    /// Sets the clock to `to`.  Moving backwards is ignored.
    pub fn set(&self, to: Instant) {
        let mut now = self.now.lock();
        if to > *now {
            *now = to;
        }
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Instant::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let start = Instant::now();
        let clock = ManualClock::new(start);
        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_millis(50));
        assert_eq!(clock.now(), start + Duration::from_millis(50));

        clock.set(start);
        assert_eq!(clock.now(), start + Duration::from_millis(50));
    }
}
