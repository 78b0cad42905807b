//! Configuration loading acceptance tests.

use crate::acceptance::common::{ms, TestPanel};
use panel_common::config::{BoardDriverKind, RuntimeConfig};
use std::io::Write;

#[test]
fn full_config_file_round_trip() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
poll_interval = "5ms"
blink_interval = "250ms"
display_refresh_interval = "100ms"
watchdog_timeout = "15ms"
led_pin = 17

[board]
driver = "sysfs_gpio"
sysfs_base = "/sys/class/gpio"

[telemetry]
enabled = true
server_addr = "192.168.0.10:47268"
var_name = "led"

[metrics]
histogram_size = 500
"#
    )
    .unwrap();

    let config = RuntimeConfig::from_file(file.path()).unwrap();
    assert_eq!(config.poll_interval, ms(5));
    assert_eq!(config.blink_interval, ms(250));
    assert_eq!(config.display_refresh_interval, ms(100));
    assert_eq!(config.watchdog_timeout, ms(15));
    assert_eq!(config.led_pin, 17);
    assert_eq!(config.board.driver, BoardDriverKind::SysfsGpio);
    assert!(config.telemetry.enabled);
    assert_eq!(config.metrics.histogram_size, 500);
}

#[test]
fn partial_config_falls_back_to_defaults() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"blink_interval = "1s""#).unwrap();

    let config = RuntimeConfig::from_file(file.path()).unwrap();
    let defaults = RuntimeConfig::default();

    assert_eq!(config.blink_interval, ms(1000));
    assert_eq!(config.poll_interval, defaults.poll_interval);
    assert_eq!(config.led_pin, defaults.led_pin);
    assert_eq!(config.board.driver, BoardDriverKind::Simulated);
}

#[test]
fn missing_config_file_is_an_error() {
    let path = std::path::Path::new("/nonexistent/softpanel.toml");
    assert!(RuntimeConfig::from_file(path).is_err());
}

#[test]
fn malformed_config_is_an_error() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, r#"blink_interval = "not-a-duration""#).unwrap();
    assert!(RuntimeConfig::from_file(file.path()).is_err());
}

#[test]
fn loaded_intervals_drive_the_panel() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
blink_interval = "200ms"
display_refresh_interval = "100ms"
"#
    )
    .unwrap();

    let config = RuntimeConfig::from_file(file.path()).unwrap();
    let mut panel = TestPanel::start(&config);

    // 1s of 100ms polls: blink every other poll, labels every poll.
    panel.poll_every(ms(100), 10);
    assert_eq!(panel.fires_of("blink"), 5);
    assert_eq!(panel.fires_of("labels"), 10);
}
