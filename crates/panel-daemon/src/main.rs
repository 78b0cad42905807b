//! Panel daemon entry point.
//!
//! Wires the polling scheduler, board driver, and telemetry link into a
//! complete runtime with signal handling and graceful shutdown.

mod signals;
mod telemetry;

use anyhow::{Context, Result};
use clap::Parser;
use panel_blocks::clock::SystemClock;
use panel_common::config::{BoardDriverKind, RuntimeConfig};
use panel_common::state::RuntimeState;
use panel_io::{BoardDriver, SimulatedBoard, SysfsGpioBoard};
use panel_runtime::scheduler::{Scheduler, SchedulerBuilder};
use panel_runtime::task::PeriodicTask;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::signals::SignalHandler;
use crate::telemetry::PlotLink;

/// Display row carrying the "P1:" label.
const LABEL_ROW_P1: u8 = 2;
/// Display row carrying the "T1:" label.
const LABEL_ROW_T1: u8 = 3;

/// Panel daemon command-line arguments.
#[derive(Parser, Debug)]
#[command(
    name = "panel-daemon",
    about = "softpanel daemon - cooperative polling runtime for panel I/O",
    version,
    long_about = None
)]
struct Args {
    /// Path to a runtime configuration file (TOML).
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Run with the simulated board (no real GPIO).
    #[arg(long, short = 's')]
    simulated: bool,

    /// Maximum passes to run (0 = infinite).
    #[arg(long, default_value = "0")]
    max_passes: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, short = 'l', default_value = "info")]
    log_level: String,

    /// Override the LED blink interval (e.g. "250ms").
    #[arg(long, value_parser = humantime::parse_duration)]
    blink_interval: Option<Duration>,

    /// Override the display refresh interval (e.g. "100ms").
    #[arg(long, value_parser = humantime::parse_duration)]
    display_interval: Option<Duration>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    info!(version = env!("CARGO_PKG_VERSION"), "Starting panel daemon");

    let mut config = load_config(&args)?;

    // Command-line overrides
    if args.simulated {
        config.board.driver = BoardDriverKind::Simulated;
    }
    if let Some(interval) = args.blink_interval {
        config.blink_interval = interval;
    }
    if let Some(interval) = args.display_interval {
        config.display_refresh_interval = interval;
    }

    info!(
        ?config.poll_interval,
        ?config.blink_interval,
        ?config.display_refresh_interval,
        ?config.board.driver,
        "Configuration loaded"
    );

    let signal_handler = SignalHandler::new().context("Failed to set up signal handlers")?;

    run_daemon(&config, &signal_handler, args.max_passes)
}

/// Initialize logging with the specified log level.
fn init_logging(level: &str) {
    let filter = format!(
        "panel_daemon={level},panel_runtime={level},panel_io={level},panel_blocks={level},panel_common={level}"
    );

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&filter)),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();
}

/// Load configuration from file or use defaults.
///
/// Resolution priority (first existing file wins):
/// 1. Command-line `--config` argument
/// 2. `PANEL_CONFIG_PATH` environment variable
/// 3. `/etc/softpanel/config.toml` (system path)
/// 4. `config/default.toml` (local development)
/// 5. Built-in defaults
fn load_config(args: &Args) -> Result<RuntimeConfig> {
    // 1. Command-line argument (highest priority)
    if let Some(config_path) = &args.config {
        info!(?config_path, "Loading config from command-line argument");
        return RuntimeConfig::from_file(config_path)
            .with_context(|| format!("Failed to load config from {config_path:?}"));
    }

    // 2. Environment variable
    if let Ok(env_path) = std::env::var("PANEL_CONFIG_PATH") {
        let config_path = PathBuf::from(&env_path);
        if config_path.exists() {
            info!(?config_path, "Loading config from PANEL_CONFIG_PATH");
            return RuntimeConfig::from_file(&config_path).with_context(|| {
                format!("Failed to load config from PANEL_CONFIG_PATH={env_path:?}")
            });
        }
        warn!(
            path = %env_path,
            "PANEL_CONFIG_PATH set but file does not exist, checking other locations"
        );
    }

    // 3. System path
    let system_path = PathBuf::from("/etc/softpanel/config.toml");
    if system_path.exists() {
        info!(?system_path, "Loading config from system path");
        return RuntimeConfig::from_file(&system_path)
            .with_context(|| format!("Failed to load config from {system_path:?}"));
    }

    // 4. Local development path
    let local_path = PathBuf::from("config/default.toml");
    if local_path.exists() {
        info!(?local_path, "Loading config from local path");
        return RuntimeConfig::from_file(&local_path)
            .with_context(|| format!("Failed to load config from {local_path:?}"));
    }

    // 5. Built-in defaults
    info!("No config file found, using built-in defaults");
    Ok(RuntimeConfig::default())
}

/// Create the board driver named in the configuration.
fn create_board_driver(config: &RuntimeConfig) -> Result<Box<dyn BoardDriver>> {
    match config.board.driver {
        BoardDriverKind::Simulated => {
            info!("Using simulated board driver");
            Ok(Box::new(SimulatedBoard::new()))
        }
        BoardDriverKind::SysfsGpio => {
            let board = match &config.board.sysfs_base {
                Some(base) => {
                    info!(?base, "Using sysfs GPIO board driver");
                    SysfsGpioBoard::with_base(base.clone())
                }
                None => {
                    info!("Using sysfs GPIO board driver at /sys/class/gpio");
                    SysfsGpioBoard::new()
                }
            };
            Ok(Box::new(board))
        }
    }
}

/// Build the scheduler with the two stock panel tasks.
///
/// - `blink`: toggles the LED pin by reading it back and writing the
///   negation, once per blink interval.
/// - `labels`: rewrites the two display labels once per refresh interval.
fn build_scheduler(config: &RuntimeConfig, clock: SystemClock) -> Scheduler<SystemClock> {
    use panel_blocks::clock::MonotonicClock;

    let now = clock.now();
    let led_pin = config.led_pin;

    SchedulerBuilder::new(clock)
        .config(config.clone())
        .watchdog_timeout(config.watchdog_timeout)
        .task(PeriodicTask::new(
            "blink",
            config.blink_interval,
            now,
            Box::new(move |board| {
                let level = board.read_digital_pin(led_pin)?;
                board.set_digital_pin(led_pin, !level)
            }),
        ))
        .task(PeriodicTask::new(
            "labels",
            config.display_refresh_interval,
            now,
            Box::new(|board| {
                board.set_display_text(LABEL_ROW_P1, "P1:")?;
                board.set_display_text(LABEL_ROW_T1, "T1:")
            }),
        ))
        .build()
}

/// Main daemon run loop.
fn run_daemon(config: &RuntimeConfig, signal_handler: &SignalHandler, max_passes: u64) -> Result<()> {
    let mut board = create_board_driver(config)?;
    let mut scheduler = build_scheduler(config, SystemClock::new());

    scheduler
        .initialize(board.as_mut())
        .context("Failed to initialize scheduler")?;

    let mut plot_link = if config.telemetry.enabled {
        match PlotLink::connect(&config.telemetry) {
            Ok(link) => Some(link),
            Err(e) => {
                warn!(error = %e, "Telemetry link unavailable, continuing without it");
                None
            }
        }
    } else {
        None
    };

    scheduler.start().context("Failed to start scheduler")?;
    info!(state = %scheduler.state(), "Scheduler started, entering main loop");

    let led_pin = config.led_pin;
    let poll_interval = config.poll_interval;
    let started = Instant::now();
    let mut next_deadline = started + poll_interval;
    let mut passes_run = 0u64;

    while scheduler.state() == RuntimeState::Run {
        if signal_handler.shutdown_requested() {
            info!("Shutdown signal received, stopping scheduler");
            break;
        }

        if signal_handler.take_reload_request() {
            info!("Reload signal received (config reload not yet implemented)");
        }

        let result = match scheduler.run_pass(board.as_mut()) {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Pass execution failed");
                signal_handler.request_shutdown();
                break;
            }
        };

        // Stream the LED state to the plot server whenever something fired.
        if result.fires > 0 {
            if let Some(link) = plot_link.as_mut() {
                let value = match board.read_digital_pin(led_pin) {
                    Ok(level) => f64::from(u8::from(level)),
                    Err(_) => 0.0,
                };
                if let Err(e) = link.send_sample(scheduler.now(), value) {
                    warn!(error = %e, "Telemetry sample dropped");
                }
                match link.poll_control() {
                    Ok(Some(telemetry::ControlMessage::Disconnect)) => {
                        info!("Dropping telemetry link");
                        plot_link = None;
                    }
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "Telemetry control poll failed"),
                }
            }
        }

        passes_run += 1;
        if max_passes > 0 && passes_run >= max_passes {
            info!(passes = passes_run, "Maximum pass count reached");
            signal_handler.request_shutdown();
            break;
        }

        // Periodic status logging (every 1000 passes)
        if passes_run % 1000 == 0 {
            let metrics = scheduler.metrics();
            info!(
                passes = passes_run,
                fires = metrics.total_fires(),
                avg_us = metrics.mean().map_or(0, |d| d.as_micros()),
                max_us = metrics.max().map_or(0, |d| d.as_micros()),
                overruns = metrics.overrun_count(),
                "Periodic status"
            );
        }

        // Pace the loop against the poll interval.
        let now = Instant::now();
        if next_deadline > now {
            std::thread::sleep(next_deadline - now);
        }
        next_deadline += poll_interval;
    }

    // Graceful shutdown
    info!("Shutting down...");

    if let Err(e) = scheduler.stop(board.as_mut()) {
        warn!(error = %e, "Scheduler stop failed");
    }

    if let Some(link) = plot_link.as_mut() {
        link.disconnect();
    }

    if let Err(e) = board.shutdown() {
        warn!(error = %e, "Board shutdown failed");
    }

    let metrics = scheduler.metrics();
    let task_fires: Vec<String> = scheduler
        .tasks()
        .iter()
        .map(|t| format!("{}={}", t.name(), t.fire_count()))
        .collect();
    info!(
        total_passes = metrics.total_passes(),
        total_fires = metrics.total_fires(),
        overruns = metrics.overrun_count(),
        tasks = task_fires.join(","),
        signals = signal_handler.state().signal_count(),
        uptime_secs = started.elapsed().as_secs(),
        final_state = %scheduler.state(),
        "Daemon shutdown complete"
    );

    Ok(())
}
