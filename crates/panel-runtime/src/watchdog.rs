//! Software watchdog for the polling loop.
//!
//! A monitor thread watches a kick timestamp updated by the poll loop. If
//! the loop stalls past the timeout, the trigger callback fires once and a
//! flag is latched for the scheduler to observe. The loop must kick the
//! watchdog once per pass.

use panel_common::{PanelError, PanelResult};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Watchdog timer that monitors the poll loop.
#[derive(Debug)]
pub struct Watchdog {
    /// Shared state between the poll loop and monitor thread.
    state: Arc<WatchdogState>,
    /// Handle to the watchdog monitor thread.
    monitor_handle: Option<JoinHandle<()>>,
    /// Configured timeout duration.
    timeout: Duration,
    /// Whether the watchdog is currently running.
    running: Arc<AtomicBool>,
}

/// Shared state for watchdog synchronization.
#[derive(Debug)]
struct WatchdogState {
    /// Timestamp of last kick (nanoseconds since start).
    last_kick_ns: AtomicU64,
    /// Monotonic start time for relative timestamps.
    start_time: Instant,
    /// Flag set when the watchdog triggers.
    triggered: AtomicBool,
    /// Flag to signal the monitor thread to stop.
    stop_requested: AtomicBool,
}

impl WatchdogState {
    fn new() -> Self {
        Self {
            last_kick_ns: AtomicU64::new(0),
            start_time: Instant::now(),
            triggered: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
        }
    }

    fn elapsed_ns(&self) -> u64 {
        self.start_time.elapsed().as_nanos() as u64
    }

    fn kick(&self) {
        self.last_kick_ns.store(self.elapsed_ns(), Ordering::Release);
    }

    fn is_timed_out(&self, timeout_ns: u64) -> bool {
        let last = self.last_kick_ns.load(Ordering::Acquire);
        let now = self.elapsed_ns();
        now.saturating_sub(last) > timeout_ns
    }
}

impl Watchdog {
    /// Create a new watchdog with the specified timeout.
    ///
    /// The watchdog is created in a stopped state. Call `start()` to begin
    /// monitoring.
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: Arc::new(WatchdogState::new()),
            monitor_handle: None,
            timeout,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Start the watchdog monitor thread.
    ///
    /// The callback is invoked once when the watchdog triggers.
    pub fn start<F>(&mut self, on_trigger: F) -> PanelResult<()>
    where
        F: Fn() + Send + 'static,
    {
        if self.running.load(Ordering::Acquire) {
            return Err(PanelError::Config("Watchdog already running".into()));
        }

        info!(timeout_ms = self.timeout.as_millis(), "Starting watchdog");

        self.state.stop_requested.store(false, Ordering::Release);
        self.state.triggered.store(false, Ordering::Release);

        // Initial kick to set baseline
        self.state.kick();

        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let timeout_ns = self.timeout.as_nanos() as u64;

        // Check 4x per timeout period, but never spin faster than 1ms
        let check_interval = (self.timeout / 4).max(Duration::from_millis(1));

        self.running.store(true, Ordering::Release);

        let handle = match thread::Builder::new()
            .name("panel-watchdog".into())
            .spawn(move || {
                debug!("Watchdog monitor thread started");

                while !state.stop_requested.load(Ordering::Acquire) {
                    thread::sleep(check_interval);

                    if state.stop_requested.load(Ordering::Acquire) {
                        break;
                    }

                    if state.is_timed_out(timeout_ns)
                        && !state.triggered.swap(true, Ordering::AcqRel)
                    {
                        error!("Watchdog timeout! Poll loop has not responded.");
                        on_trigger();
                    }
                }

                running.store(false, Ordering::Release);
                debug!("Watchdog monitor thread stopped");
            }) {
            Ok(h) => h,
            Err(e) => {
                self.running.store(false, Ordering::Release);
                return Err(PanelError::Config(format!(
                    "Failed to spawn watchdog thread: {e}"
                )));
            }
        };

        self.monitor_handle = Some(handle);
        Ok(())
    }

    /// Kick the watchdog to indicate the poll loop is alive.
    ///
    /// This should be called once per pass.
    #[inline]
    pub fn kick(&self) {
        self.state.kick();
    }

    /// Check if the watchdog has triggered.
    #[inline]
    pub fn has_triggered(&self) -> bool {
        self.state.triggered.load(Ordering::Acquire)
    }

    /// Acknowledge a trigger: clear the flag and kick.
    pub fn reset(&self) {
        self.state.triggered.store(false, Ordering::Release);
        self.state.kick();
        info!("Watchdog reset");
    }

    /// Stop the watchdog monitor thread.
    pub fn stop(&mut self) {
        if !self.running.load(Ordering::Acquire) {
            return;
        }

        info!("Stopping watchdog");
        self.state.stop_requested.store(true, Ordering::Release);

        if let Some(handle) = self.monitor_handle.take() {
            if let Err(e) = handle.join() {
                warn!("Watchdog thread panicked: {:?}", e);
            }
        }
    }

    /// Check if the watchdog is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Get time since last kick.
    pub fn time_since_kick(&self) -> Duration {
        let last = self.state.last_kick_ns.load(Ordering::Acquire);
        let now = self.state.elapsed_ns();
        Duration::from_nanos(now.saturating_sub(last))
    }
}

impl Drop for Watchdog {
    fn drop(&mut self) {
        self.stop();
    }
}
