//! Periodic tasks: an interval timer paired with a board action.

use panel_blocks::interval::IntervalTimer;
use panel_common::PanelResult;
use panel_io::BoardDriver;
use std::time::Duration;

/// Action executed against the board when a task's timer fires.
pub type TaskAction = Box<dyn FnMut(&mut dyn BoardDriver) -> PanelResult<()> + Send>;

/// A named, timer-gated action owned by the scheduler.
///
/// Each task carries its own [`IntervalTimer`]; tasks are fully independent
/// and are checked in registration order within a pass.
pub struct PeriodicTask {
    name: String,
    timer: IntervalTimer,
    action: TaskAction,
    fire_count: u64,
}

impl PeriodicTask {
    /// Create a task armed at `now`.
    pub fn new(
        name: impl Into<String>,
        interval: Duration,
        now: Duration,
        action: TaskAction,
    ) -> Self {
        Self {
            name: name.into(),
            timer: IntervalTimer::new(interval, now),
            action,
            fire_count: 0,
        }
    }

    /// Task name (used in logs and the shutdown summary).
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The task's trigger interval.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.timer.interval()
    }

    /// How many times this task has fired.
    #[must_use]
    pub fn fire_count(&self) -> u64 {
        self.fire_count
    }

    /// Poll the task's timer and run the action if it fired.
    ///
    /// Returns `Ok(true)` if the task fired, `Ok(false)` if the interval has
    /// not elapsed, and the action's error if it fired and failed.
    pub fn poll(&mut self, now: Duration, board: &mut dyn BoardDriver) -> PanelResult<bool> {
        if !self.timer.poll_and_consume(now) {
            return Ok(false);
        }
        self.fire_count += 1;
        (self.action)(board)?;
        Ok(true)
    }
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("interval", &self.timer.interval())
            .field("fire_count", &self.fire_count)
            .finish_non_exhaustive()
    }
}
