//! Fault handling and safe-output acceptance tests.

use crate::acceptance::common::{ms, TestPanel, LED_PIN};
use panel_blocks::clock::ManualClock;
use panel_common::config::RuntimeConfig;
use panel_common::error::PanelError;
use panel_common::state::RuntimeState;
use panel_io::{SimulatedBoard, DISPLAY_ROWS, PIN_COUNT};
use panel_runtime::scheduler::SchedulerBuilder;
use panel_runtime::task::PeriodicTask;
use std::time::Duration;

#[test]
fn failing_task_faults_the_panel_and_drives_safe_outputs() {
    let clock = ManualClock::new();
    let mut board = SimulatedBoard::new();

    let mut scheduler = SchedulerBuilder::new(clock.clone())
        .task(PeriodicTask::new(
            "lamp",
            ms(100),
            Duration::ZERO,
            Box::new(|board| board.set_digital_pin(7, true)),
        ))
        .task(PeriodicTask::new(
            "broken",
            ms(100),
            Duration::ZERO,
            Box::new(|board| {
                board.set_display_text(1, "??")?;
                Err(PanelError::Board("bus error".into()))
            }),
        ))
        .build();

    scheduler.initialize(&mut board).unwrap();
    scheduler.start().unwrap();

    clock.advance(ms(100));
    let err = scheduler.run_pass(&mut board).unwrap_err();
    assert!(matches!(err, PanelError::Board(_)));
    assert_eq!(scheduler.state(), RuntimeState::Fault);

    // Everything the tasks wrote before the fault is now safe.
    for pin in 0..PIN_COUNT {
        assert!(!board.pin(pin), "pin {pin} still high after fault");
    }
    for row in 0..DISPLAY_ROWS {
        assert_eq!(board.display_row(row), "", "row {row} not cleared");
    }

    // A faulted panel refuses further passes.
    assert!(scheduler.run_pass(&mut board).is_err());
}

#[test]
fn graceful_stop_clears_outputs() {
    let config = RuntimeConfig::default();
    let mut panel = TestPanel::start(&config);

    // Run long enough for the LED to be high and labels written.
    panel.poll_every(ms(500), 1);
    assert!(panel.board.pin(LED_PIN));
    assert_eq!(panel.board.display_row(2), "P1:");

    panel.scheduler.stop(&mut panel.board).unwrap();
    assert_eq!(panel.scheduler.state(), RuntimeState::SafeStop);
    assert!(!panel.board.pin(LED_PIN));
    assert_eq!(panel.board.display_row(2), "");
    assert_eq!(panel.board.display_row(3), "");
}

#[test]
fn stopped_panel_rejects_passes() {
    let config = RuntimeConfig::default();
    let mut panel = TestPanel::start(&config);

    panel.scheduler.stop(&mut panel.board).unwrap();

    panel.clock.advance(ms(100));
    assert!(panel.scheduler.run_pass(&mut panel.board).is_err());
}

#[test]
fn stalled_loop_trips_the_watchdog() {
    let clock = ManualClock::new();
    let mut board = SimulatedBoard::new();

    let mut scheduler = SchedulerBuilder::new(clock)
        .watchdog_timeout(ms(20))
        .build();

    scheduler.initialize(&mut board).unwrap();
    scheduler.start().unwrap();

    // A healthy loop keeps the watchdog quiet.
    scheduler.run_pass(&mut board).unwrap();
    assert!(!scheduler.watchdog_triggered());

    // Stall well past the timeout without kicking.
    std::thread::sleep(Duration::from_millis(150));
    assert!(scheduler.watchdog_triggered());

    let err = scheduler.run_pass(&mut board).unwrap_err();
    assert!(matches!(err, PanelError::WatchdogTimeout(_)));
    assert_eq!(scheduler.state(), RuntimeState::Fault);
}
