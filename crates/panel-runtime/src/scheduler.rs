//! Cooperative polling scheduler for the panel runtime.
//!
//! The scheduler implements the classic sketch loop:
//! 1. Sample the monotonic clock once
//! 2. Poll every task's interval timer
//! 3. Run the action of each timer that fired
//! 4. Sleep out the remainder of the poll interval
//!
//! Nothing blocks inside a pass; expiration is detected at poll
//! granularity, so the poll interval should be no longer than the
//! shortest task interval.

use crate::task::PeriodicTask;
use crate::watchdog::Watchdog;
use panel_blocks::clock::MonotonicClock;
use panel_common::config::RuntimeConfig;
use panel_common::error::{PanelError, PanelResult};
use panel_common::metrics::PassMetrics;
use panel_common::state::{RuntimeState, StateMachine};
use panel_io::{BoardDriver, DISPLAY_ROWS, PIN_COUNT};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, trace, warn};

/// Result of a single poll pass.
#[derive(Debug, Clone)]
pub struct PassResult {
    /// Wall time spent executing this pass.
    pub duration: Duration,
    /// Number of tasks that fired during this pass.
    pub fires: u32,
    /// Whether the pass ran longer than the poll interval.
    pub overrun: bool,
    /// Current pass number.
    pub pass_count: u64,
}

/// Cooperative polling scheduler.
///
/// Owns the periodic tasks and the injected clock; the board is supplied
/// by the caller on each operation so tests can inspect it between passes.
pub struct Scheduler<C: MonotonicClock> {
    /// Injected monotonic time source.
    clock: C,
    /// Timer-gated tasks, checked in registration order.
    tasks: Vec<PeriodicTask>,
    /// Runtime state machine.
    state: StateMachine,
    /// Target period of one pass.
    poll_interval: Duration,
    /// Next pass deadline (absolute time), used for pacing in `run`.
    next_deadline: Option<Instant>,
    /// Total passes executed.
    pass_count: u64,
    /// Metrics collection.
    metrics: PassMetrics,
    /// Watchdog timer.
    watchdog: Option<Watchdog>,
}

impl<C: MonotonicClock> Scheduler<C> {
    /// Create a new scheduler with the given clock and configuration.
    pub fn new(clock: C, config: &RuntimeConfig) -> Self {
        let metrics = PassMetrics::new(config.metrics.histogram_size, config.poll_interval);

        Self {
            clock,
            tasks: Vec::new(),
            state: StateMachine::new(),
            poll_interval: config.poll_interval,
            next_deadline: None,
            pass_count: 0,
            metrics,
            watchdog: None,
        }
    }

    /// Create a scheduler with default configuration.
    pub fn with_defaults(clock: C) -> Self {
        Self::new(clock, &RuntimeConfig::default())
    }

    /// Register a periodic task. Tasks are polled in registration order.
    pub fn add_task(&mut self, task: PeriodicTask) {
        debug!(
            task = task.name(),
            interval_ms = task.interval().as_millis(),
            "Registered task"
        );
        self.tasks.push(task);
    }

    /// Set the watchdog timer.
    pub fn set_watchdog(&mut self, watchdog: Watchdog) {
        self.watchdog = Some(watchdog);
    }

    /// Get the current runtime state.
    pub fn state(&self) -> RuntimeState {
        self.state.state()
    }

    /// Get pass metrics.
    pub fn metrics(&self) -> &PassMetrics {
        &self.metrics
    }

    /// Get total pass count.
    pub fn pass_count(&self) -> u64 {
        self.pass_count
    }

    /// Get the registered tasks (for fire-count summaries).
    pub fn tasks(&self) -> &[PeriodicTask] {
        &self.tasks
    }

    /// Read the scheduler's clock.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Initialize the scheduler and the board.
    ///
    /// Transitions from BOOT → INIT.
    pub fn initialize(&mut self, board: &mut dyn BoardDriver) -> PanelResult<()> {
        info!("Initializing scheduler");

        board
            .init()
            .map_err(|e| PanelError::Config(format!("Board initialization failed: {e}")))?;

        self.state.transition(RuntimeState::Init)?;

        info!("Scheduler initialized, state: INIT");
        Ok(())
    }

    /// Start cooperative polling.
    ///
    /// Transitions from INIT → RUN and starts the watchdog monitor.
    pub fn start(&mut self) -> PanelResult<()> {
        if self.state.state() != RuntimeState::Init {
            return Err(PanelError::InvalidStateTransition {
                from: self.state.state().to_string(),
                to: RuntimeState::Run.to_string(),
            });
        }

        if let Some(shortest) = self.tasks.iter().map(PeriodicTask::interval).min() {
            if self.poll_interval > shortest {
                warn!(
                    poll_ms = self.poll_interval.as_millis(),
                    shortest_task_ms = shortest.as_millis(),
                    "Poll interval exceeds shortest task interval; firings will be late"
                );
            }
        }

        info!(
            poll_interval_us = self.poll_interval.as_micros(),
            tasks = self.tasks.len(),
            "Starting cooperative polling"
        );

        if let Some(wd) = self.watchdog.as_mut() {
            // The latched trigger flag is observed in run_pass; the monitor
            // thread itself only needs to log.
            wd.start(|| {})?;
        }

        self.state.transition(RuntimeState::Run)?;
        self.next_deadline = Some(Instant::now() + self.poll_interval);

        Ok(())
    }

    /// Execute one poll pass.
    ///
    /// This is the core loop iteration:
    /// 1. Kick the watchdog (and fault if it already triggered)
    /// 2. Sample the clock once
    /// 3. Poll every task timer, running the actions that fired
    /// 4. Record metrics
    ///
    /// Pacing is the caller's concern (`run` paces against the poll
    /// interval; tests drive passes back to back with a manual clock).
    pub fn run_pass(&mut self, board: &mut dyn BoardDriver) -> PanelResult<PassResult> {
        if self.state.state() != RuntimeState::Run {
            return Err(PanelError::Fault(format!(
                "Cannot run pass in state {}",
                self.state.state()
            )));
        }

        if self.watchdog_triggered() {
            self.enter_fault(board, "Watchdog triggered");
            return Err(PanelError::WatchdogTimeout(
                "poll loop stalled past watchdog timeout".into(),
            ));
        }
        if let Some(ref wd) = self.watchdog {
            wd.kick();
        }

        let pass_start = Instant::now();
        let now = self.clock.now();

        let mut fires = 0u32;
        for idx in 0..self.tasks.len() {
            let task = &mut self.tasks[idx];
            match task.poll(now, board) {
                Ok(true) => {
                    trace!(task = task.name(), now_ms = now.as_millis(), "Task fired");
                    fires += 1;
                }
                Ok(false) => {}
                Err(e) => {
                    let reason = format!("Task '{}' failed: {e}", task.name());
                    self.enter_fault(board, &reason);
                    return Err(e);
                }
            }
        }

        let duration = pass_start.elapsed();
        self.pass_count += 1;
        self.metrics.record(duration, fires);

        let overrun = duration > self.poll_interval;
        if overrun {
            warn!(
                pass = self.pass_count,
                duration_us = duration.as_micros(),
                poll_us = self.poll_interval.as_micros(),
                "Pass overran the poll interval"
            );
        }

        trace!(
            pass = self.pass_count,
            fires,
            duration_us = duration.as_micros(),
            "Pass complete"
        );

        Ok(PassResult {
            duration,
            fires,
            overrun,
            pass_count: self.pass_count,
        })
    }

    /// Run the polling loop until stopped or faulted.
    ///
    /// This blocks the current thread, pacing passes against the poll
    /// interval.
    pub fn run(&mut self, board: &mut dyn BoardDriver) -> PanelResult<()> {
        info!("Entering main polling loop");

        while self.state.state() == RuntimeState::Run {
            self.run_pass(board)?;

            if let Some(deadline) = self.next_deadline {
                Self::wait_until(deadline);
                self.next_deadline = Some(deadline + self.poll_interval);
            }
        }

        info!(
            final_state = %self.state.state(),
            passes = self.pass_count,
            "Polling loop exited"
        );

        Ok(())
    }

    /// Stop polling gracefully.
    ///
    /// Transitions RUN → SAFE_STOP and drives safe outputs.
    pub fn stop(&mut self, board: &mut dyn BoardDriver) -> PanelResult<()> {
        info!("Stopping scheduler");

        if matches!(self.state.state(), RuntimeState::Run | RuntimeState::Init) {
            self.state.transition(RuntimeState::SafeStop)?;
        }

        Self::set_safe_outputs(board);

        if let Some(wd) = self.watchdog.as_mut() {
            wd.stop();
        }

        Ok(())
    }

    /// Check if the watchdog has triggered.
    pub fn watchdog_triggered(&self) -> bool {
        self.watchdog.as_ref().is_some_and(Watchdog::has_triggered)
    }

    /// Enter fault state and drive safe outputs.
    fn enter_fault(&mut self, board: &mut dyn BoardDriver, reason: &str) {
        error!(reason, "Entering FAULT state");
        self.state.enter_fault();
        Self::set_safe_outputs(board);
    }

    /// Drive all outputs to their safe values: pins low, display blank.
    fn set_safe_outputs(board: &mut dyn BoardDriver) {
        debug!("Setting outputs to safe state");
        for pin in 0..PIN_COUNT {
            let _ = board.set_digital_pin(pin, false);
        }
        for row in 0..DISPLAY_ROWS {
            let _ = board.set_display_text(row, "");
        }
    }

    /// Wait until the specified deadline using high-precision sleep.
    #[cfg(target_os = "linux")]
    fn wait_until(deadline: Instant) {
        let now = Instant::now();
        if deadline <= now {
            return; // Already past deadline
        }

        let duration = deadline - now;

        let ts = libc::timespec {
            tv_sec: duration.as_secs() as libc::time_t,
            tv_nsec: libc::c_long::from(duration.subsec_nanos()),
        };

        // SAFETY: clock_nanosleep is safe with valid parameters
        unsafe {
            libc::clock_nanosleep(libc::CLOCK_MONOTONIC, 0, &ts, std::ptr::null_mut());
        }
    }

    #[cfg(not(target_os = "linux"))]
    fn wait_until(deadline: Instant) {
        let now = Instant::now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Builder for configuring the scheduler.
pub struct SchedulerBuilder<C: MonotonicClock> {
    clock: C,
    config: RuntimeConfig,
    watchdog_timeout: Option<Duration>,
    tasks: Vec<PeriodicTask>,
}

impl<C: MonotonicClock> SchedulerBuilder<C> {
    /// Create a new builder with the given clock.
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            config: RuntimeConfig::default(),
            watchdog_timeout: None,
            tasks: Vec::new(),
        }
    }

    /// Set the poll interval.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    /// Set the watchdog timeout.
    pub fn watchdog_timeout(mut self, timeout: Duration) -> Self {
        self.watchdog_timeout = Some(timeout);
        self
    }

    /// Set the full runtime configuration.
    pub fn config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a periodic task.
    pub fn task(mut self, task: PeriodicTask) -> Self {
        self.tasks.push(task);
        self
    }

    /// Build the scheduler.
    pub fn build(self) -> Scheduler<C> {
        let mut scheduler = Scheduler::new(self.clock, &self.config);

        for task in self.tasks {
            scheduler.add_task(task);
        }

        if let Some(timeout) = self.watchdog_timeout {
            scheduler.set_watchdog(Watchdog::new(timeout));
        }

        scheduler
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use panel_blocks::clock::ManualClock;
    use panel_io::SimulatedBoard;

    const fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn blink_task(pin: u8, interval: Duration, now: Duration) -> PeriodicTask {
        PeriodicTask::new(
            "blink",
            interval,
            now,
            Box::new(move |board| {
                let level = board.read_digital_pin(pin)?;
                board.set_digital_pin(pin, !level)
            }),
        )
    }

    #[test]
    fn test_scheduler_state_transitions() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = Scheduler::with_defaults(clock);

        assert_eq!(scheduler.state(), RuntimeState::Boot);

        scheduler.initialize(&mut board).unwrap();
        assert_eq!(scheduler.state(), RuntimeState::Init);

        scheduler.start().unwrap();
        assert_eq!(scheduler.state(), RuntimeState::Run);

        scheduler.stop(&mut board).unwrap();
        assert_eq!(scheduler.state(), RuntimeState::SafeStop);
    }

    #[test]
    fn test_cannot_start_from_boot() {
        let clock = ManualClock::new();
        let mut scheduler = Scheduler::with_defaults(clock);

        assert!(scheduler.start().is_err());
    }

    #[test]
    fn test_run_pass_requires_run_state() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = Scheduler::with_defaults(clock);

        assert!(scheduler.run_pass(&mut board).is_err());
    }

    #[test]
    fn test_blink_cadence() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = SchedulerBuilder::new(clock.clone())
            .poll_interval(ms(10))
            .task(blink_task(4, ms(500), clock.now()))
            .build();

        scheduler.initialize(&mut board).unwrap();
        scheduler.start().unwrap();

        // Poll every 100ms for 2s: the LED must toggle at 500ms boundaries.
        let mut toggles = 0;
        for _ in 0..20 {
            clock.advance(ms(100));
            let result = scheduler.run_pass(&mut board).unwrap();
            toggles += result.fires;
        }

        assert_eq!(toggles, 4); // t = 500, 1000, 1500, 2000
        // Four toggles from low: high, low, high, low.
        assert!(!board.pin(4));
        assert_eq!(scheduler.pass_count(), 20);
        assert_eq!(scheduler.metrics().total_fires(), 4);
    }

    #[test]
    fn test_two_tasks_fire_independently() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = SchedulerBuilder::new(clock.clone())
            .poll_interval(ms(10))
            .task(blink_task(4, ms(500), clock.now()))
            .task(PeriodicTask::new(
                "labels",
                ms(50),
                clock.now(),
                Box::new(|board| {
                    board.set_display_text(2, "P1:")?;
                    board.set_display_text(3, "T1:")
                }),
            ))
            .build();

        scheduler.initialize(&mut board).unwrap();
        scheduler.start().unwrap();

        for _ in 0..10 {
            clock.advance(ms(50));
            scheduler.run_pass(&mut board).unwrap();
        }

        // 500ms elapsed: blink fired once, labels fired every pass.
        let fires: Vec<(String, u64)> = scheduler
            .tasks()
            .iter()
            .map(|t| (t.name().to_string(), t.fire_count()))
            .collect();
        assert_eq!(fires[0], ("blink".to_string(), 1));
        assert_eq!(fires[1], ("labels".to_string(), 10));
        assert_eq!(board.display_row(2), "P1:");
        assert_eq!(board.display_row(3), "T1:");
    }

    #[test]
    fn test_task_failure_faults_and_drives_safe_outputs() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = SchedulerBuilder::new(clock.clone())
            .task(PeriodicTask::new(
                "bad",
                ms(100),
                clock.now(),
                Box::new(|board| {
                    board.set_digital_pin(4, true)?;
                    Err(PanelError::Board("display controller went away".into()))
                }),
            ))
            .build();

        scheduler.initialize(&mut board).unwrap();
        scheduler.start().unwrap();

        clock.advance(ms(100));
        let err = scheduler.run_pass(&mut board).unwrap_err();
        assert!(matches!(err, PanelError::Board(_)));
        assert_eq!(scheduler.state(), RuntimeState::Fault);
        // Safe outputs: the pin the action raised was driven low again.
        assert!(!board.pin(4));
    }

    #[test]
    fn test_run_exits_on_fault() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = SchedulerBuilder::new(clock.clone())
            .poll_interval(ms(1))
            .task(PeriodicTask::new(
                "bad",
                ms(0), // fires on the first pass
                clock.now(),
                Box::new(|_| Err(PanelError::Fault("boom".into()))),
            ))
            .build();

        scheduler.initialize(&mut board).unwrap();
        scheduler.start().unwrap();

        assert!(scheduler.run(&mut board).is_err());
        assert_eq!(scheduler.state(), RuntimeState::Fault);
    }

    #[test]
    fn test_stop_clears_display() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = SchedulerBuilder::new(clock.clone())
            .task(PeriodicTask::new(
                "labels",
                ms(50),
                clock.now(),
                Box::new(|board| board.set_display_text(2, "P1:")),
            ))
            .build();

        scheduler.initialize(&mut board).unwrap();
        scheduler.start().unwrap();

        clock.advance(ms(50));
        scheduler.run_pass(&mut board).unwrap();
        assert_eq!(board.display_row(2), "P1:");

        scheduler.stop(&mut board).unwrap();
        assert_eq!(board.display_row(2), "");
    }

    #[test]
    fn test_scheduler_builder_watchdog() {
        let clock = ManualClock::new();
        let scheduler = SchedulerBuilder::new(clock)
            .poll_interval(ms(5))
            .watchdog_timeout(ms(15))
            .build();

        assert_eq!(scheduler.poll_interval, ms(5));
        assert!(scheduler.watchdog.is_some());
        assert!(!scheduler.watchdog_triggered());
    }

    #[test]
    fn test_metrics_collection() {
        let clock = ManualClock::new();
        let mut board = SimulatedBoard::new();
        let mut scheduler = Scheduler::with_defaults(clock);

        scheduler.initialize(&mut board).unwrap();
        scheduler.start().unwrap();

        for _ in 0..10 {
            scheduler.run_pass(&mut board).unwrap();
        }

        let metrics = scheduler.metrics();
        assert_eq!(metrics.total_passes(), 10);
        assert!(metrics.min().is_some());
        assert!(metrics.max().is_some());
    }
}
