//! Timer boundary and pacing acceptance tests.
//!
//! The panel is polled much faster than its task intervals, so firing
//! must land exactly on interval boundaries; when polling is coarser
//! than an interval, firing slips to the next poll and the schedule
//! resynchronizes from there instead of catching up.

use crate::acceptance::common::{ms, TestPanel, LED_PIN};
use panel_blocks::MonotonicClock;
use panel_common::config::RuntimeConfig;
use std::time::Duration;

#[test]
fn blink_fires_on_exact_boundaries() {
    let config = RuntimeConfig {
        blink_interval: ms(500),
        ..RuntimeConfig::default()
    };
    let mut panel = TestPanel::start(&config);

    // Poll every 100ms out to 2s and note when the blink task fires.
    let mut fired_at = Vec::new();
    let mut seen = 0;
    for _ in 0..20 {
        panel.clock.advance(ms(100));
        panel.scheduler.run_pass(&mut panel.board).unwrap();
        let fires = panel.fires_of("blink");
        if fires > seen {
            fired_at.push(panel.clock.now().as_millis());
            seen = fires;
        }
    }

    assert_eq!(fired_at, vec![500, 1000, 1500, 2000]);
    // Four toggles from low: high, low, high, low.
    assert!(!panel.board.pin(LED_PIN));
}

#[test]
fn coarse_polling_slips_to_next_poll() {
    let config = RuntimeConfig {
        blink_interval: ms(500),
        ..RuntimeConfig::default()
    };
    let mut panel = TestPanel::start(&config);

    // Polling every 300ms cannot hit the 500ms boundary. The timer fires
    // at the first poll past each boundary and re-anchors there.
    let mut fired_at = Vec::new();
    let mut seen = 0;
    for _ in 0..6 {
        panel.clock.advance(ms(300));
        panel.scheduler.run_pass(&mut panel.board).unwrap();
        let fires = panel.fires_of("blink");
        if fires > seen {
            fired_at.push(panel.clock.now().as_millis());
            seen = fires;
        }
    }

    assert_eq!(fired_at, vec![600, 1200, 1800]);
}

#[test]
fn stalled_poll_loop_fires_once_not_per_missed_interval() {
    let config = RuntimeConfig {
        blink_interval: ms(500),
        ..RuntimeConfig::default()
    };
    let mut panel = TestPanel::start(&config);

    // The loop stalls for four full blink intervals, then polls once.
    panel.clock.advance(ms(2000));
    panel.scheduler.run_pass(&mut panel.board).unwrap();

    assert_eq!(panel.fires_of("blink"), 1);
    assert!(panel.board.pin(LED_PIN));

    // The next firing is a full interval after the late one.
    panel.clock.advance(ms(499));
    panel.scheduler.run_pass(&mut panel.board).unwrap();
    assert_eq!(panel.fires_of("blink"), 1);

    panel.clock.advance(ms(1));
    panel.scheduler.run_pass(&mut panel.board).unwrap();
    assert_eq!(panel.fires_of("blink"), 2);
}

#[test]
fn blink_and_labels_run_independently() {
    let config = RuntimeConfig {
        blink_interval: ms(500),
        display_refresh_interval: ms(50),
        ..RuntimeConfig::default()
    };
    let mut panel = TestPanel::start(&config);

    // 1s of 50ms polls: labels fires every poll, blink every tenth.
    panel.poll_every(ms(50), 20);

    assert_eq!(panel.fires_of("blink"), 2);
    assert_eq!(panel.fires_of("labels"), 20);
    assert_eq!(panel.board.display_row(2), "P1:");
    assert_eq!(panel.board.display_row(3), "T1:");
    // Rows the label task never touches stay blank.
    assert_eq!(panel.board.display_row(0), "");
    assert_eq!(panel.board.display_row(1), "");
}

#[test]
fn metrics_track_passes_and_fires() {
    let config = RuntimeConfig {
        blink_interval: ms(100),
        display_refresh_interval: ms(100),
        ..RuntimeConfig::default()
    };
    let mut panel = TestPanel::start(&config);

    panel.poll_every(Duration::from_millis(100), 10);

    let snapshot = panel.scheduler.metrics().snapshot();
    assert_eq!(snapshot.total_passes, 10);
    // Both tasks fire on every 100ms poll.
    assert_eq!(snapshot.total_fires, 20);
}
