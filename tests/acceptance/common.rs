//! Shared fixtures for the acceptance suite.

use panel_blocks::clock::ManualClock;
use panel_common::config::RuntimeConfig;
use panel_io::SimulatedBoard;
use panel_runtime::scheduler::{Scheduler, SchedulerBuilder};
use panel_runtime::task::PeriodicTask;
use std::time::Duration;

/// Pin driving the panel LED in all fixtures.
pub const LED_PIN: u8 = 4;

/// Shorthand for millisecond durations.
pub const fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

/// A running panel: scheduler, simulated board, and a shared clock handle.
pub struct TestPanel {
    pub clock: ManualClock,
    pub board: SimulatedBoard,
    pub scheduler: Scheduler<ManualClock>,
}

impl TestPanel {
    /// Build the stock panel (blink + display labels), initialized and
    /// started, with the clock at zero.
    pub fn start(config: &RuntimeConfig) -> Self {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();

        let led_pin = config.led_pin;
        let mut scheduler = SchedulerBuilder::new(clock.clone())
            .config(config.clone())
            .task(PeriodicTask::new(
                "blink",
                config.blink_interval,
                Duration::ZERO,
                Box::new(move |board| {
                    let level = board.read_digital_pin(led_pin)?;
                    board.set_digital_pin(led_pin, !level)
                }),
            ))
            .task(PeriodicTask::new(
                "labels",
                config.display_refresh_interval,
                Duration::ZERO,
                Box::new(|board| {
                    board.set_display_text(2, "P1:")?;
                    board.set_display_text(3, "T1:")
                }),
            ))
            .build();

        scheduler.initialize(&mut board).unwrap();
        scheduler.start().unwrap();

        Self {
            clock,
            board,
            scheduler,
        }
    }

    /// Advance the clock by `step` and run one pass, `count` times.
    ///
    /// Returns the total number of task firings observed.
    pub fn poll_every(&mut self, step: Duration, count: usize) -> u32 {
        let mut fires = 0;
        for _ in 0..count {
            self.clock.advance(step);
            let result = self.scheduler.run_pass(&mut self.board).unwrap();
            fires += result.fires;
        }
        fires
    }

    /// Fire count of a task by name. Panics if the name is unknown.
    pub fn fires_of(&self, name: &str) -> u64 {
        self.scheduler
            .tasks()
            .iter()
            .find(|t| t.name() == name)
            .map(panel_runtime::task::PeriodicTask::fire_count)
            .unwrap_or_else(|| panic!("no task named {name}"))
    }
}
