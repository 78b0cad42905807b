//! Non-blocking interval timer.
//!
//! The timer never blocks and never spawns anything: the host loop polls it
//! and acts on the returned flag. Expiration is therefore detected at poll
//! granularity, so the host must poll at least as often as the shortest
//! interval it cares about.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Non-blocking, drift-tolerant periodic trigger.
///
/// Tracks a fixed interval and the clock reading at which it last fired.
/// Polling with [`poll_and_consume`](Self::poll_and_consume) returns `true`
/// once per elapsed interval and rearms the timer from the poll's `now`, not
/// from an ideal schedule: a late poll yields exactly one firing and the next
/// interval is measured from that poll. There is no catch-up.
///
/// # Timing Diagram
///
/// ```text
/// interval = 5
///
/// poll      1   3   5   7   9   11  13      20  21
///           |   |   |   |   |   |   |       |   |
/// fires?    .   .   Y   .   .   Y   .       Y   .
///               rearm@5    rearm@11      rearm@20
/// ```
///
/// # Example
///
/// ```
/// use panel_blocks::interval::IntervalTimer;
/// use std::time::Duration;
///
/// let ms = Duration::from_millis;
/// let mut timer = IntervalTimer::new(ms(500), ms(0));
///
/// assert!(!timer.poll_and_consume(ms(100)));
/// assert!(!timer.poll_and_consume(ms(499)));
/// assert!(timer.poll_and_consume(ms(500)));
/// // Rearmed from t=500; the signal was consumed.
/// assert!(!timer.poll_and_consume(ms(500)));
/// assert!(timer.poll_and_consume(ms(1000)));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalTimer {
    /// Fixed trigger interval. Immutable after construction.
    interval: Duration,
    /// Clock reading at construction or at the most recent firing.
    last_fired: Duration,
}

impl IntervalTimer {
    /// Create a timer armed at `now` with a fixed `interval`.
    ///
    /// A zero interval is permitted and degenerates to "fires on every poll".
    #[must_use]
    pub fn new(interval: Duration, now: Duration) -> Self {
        Self {
            interval,
            last_fired: now,
        }
    }

    /// Poll the timer, consuming the expired signal if present.
    ///
    /// Returns `true` if at least `interval` has elapsed since the last
    /// firing (or construction), and rearms the timer from `now`. Returns
    /// `false` with no state change otherwise.
    ///
    /// The name is deliberate: this is a mutating query, not a pure
    /// predicate. Use [`is_expired`](Self::is_expired) to peek without
    /// consuming.
    pub fn poll_and_consume(&mut self, now: Duration) -> bool {
        if self.elapsed(now) >= self.interval {
            self.last_fired = now;
            true
        } else {
            false
        }
    }

    /// Peek at expiration without rearming.
    #[must_use]
    pub fn is_expired(&self, now: Duration) -> bool {
        self.elapsed(now) >= self.interval
    }

    /// Time elapsed since the last firing.
    ///
    /// Saturates at zero if `now` reads earlier than the last firing; a
    /// backwards clock is an environmental invariant violation, not a
    /// handled error, and it degrades to "nothing elapsed" here.
    #[must_use]
    pub fn elapsed(&self, now: Duration) -> Duration {
        now.saturating_sub(self.last_fired)
    }

    /// The fixed trigger interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Move the reference time to `now` without firing.
    ///
    /// The next interval is measured from `now`.
    pub fn rearm(&mut self, now: Duration) {
        self.last_fired = now;
    }
}
