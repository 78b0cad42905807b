//! Monotonic clock capability.
//!
//! The polling loop and every timer it owns read time through
//! [`MonotonicClock`] instead of calling `Instant::now()` directly, so the
//! whole runtime can be driven by a fake clock in tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A non-decreasing time source with at least millisecond resolution.
///
/// The epoch is arbitrary (typically process start); only differences
/// between readings are meaningful.
pub trait MonotonicClock {
    /// Time elapsed since the clock's epoch.
    fn now(&self) -> Duration;
}

/// Wall-runtime clock anchored to an `Instant` taken at construction.
#[derive(Debug, Clone)]
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    /// Create a clock whose epoch is "now".
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl MonotonicClock for SystemClock {
    fn now(&self) -> Duration {
        self.epoch.elapsed()
    }
}

/// Manually-driven clock for tests.
///
/// Cloned handles share the same underlying time, so a test can hold one
/// handle while the scheduler under test holds another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ns: Arc<AtomicU64>,
}

impl ManualClock {
    /// Create a clock reading zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now_ns
            .fetch_add(delta.as_nanos() as u64, Ordering::SeqCst);
    }

    /// Set the clock to an absolute reading.
    ///
    /// Intended for test setup; moving the clock backwards violates the
    /// monotonicity the rest of the runtime assumes.
    pub fn set(&self, now: Duration) {
        self.now_ns.store(now.as_nanos() as u64, Ordering::SeqCst);
    }
}

impl MonotonicClock for ManualClock {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::SeqCst))
    }
}
