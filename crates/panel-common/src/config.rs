//! Configuration structures for the panel runtime.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Target period of one poll pass over all tasks.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,

    /// Interval between LED toggles.
    #[serde(with = "humantime_serde")]
    pub blink_interval: Duration,

    /// Interval between display label refreshes.
    #[serde(with = "humantime_serde")]
    pub display_refresh_interval: Duration,

    /// Watchdog timeout (typically 2-3x poll interval).
    #[serde(with = "humantime_serde")]
    pub watchdog_timeout: Duration,

    /// Digital pin driving the panel LED.
    pub led_pin: u8,

    /// Board driver configuration.
    pub board: BoardConfig,

    /// Telemetry link configuration.
    pub telemetry: TelemetryConfig,

    /// Metrics configuration.
    pub metrics: MetricsConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            blink_interval: Duration::from_millis(500),
            display_refresh_interval: Duration::from_millis(50),
            watchdog_timeout: Duration::from_millis(30),
            led_pin: 4,
            board: BoardConfig::default(),
            telemetry: TelemetryConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

/// Board driver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Board driver type.
    pub driver: BoardDriverKind,

    /// Base path of the sysfs GPIO tree (sysfs_gpio driver only).
    pub sysfs_base: Option<PathBuf>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            driver: BoardDriverKind::Simulated,
            sysfs_base: None,
        }
    }
}

/// Supported board drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BoardDriverKind {
    /// Simulated pins and display for testing.
    #[default]
    Simulated,
    /// Digital pins via the Linux sysfs GPIO interface.
    SysfsGpio,
}

/// Telemetry (UDP plot stream) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Enable the telemetry link.
    pub enabled: bool,

    /// Plot server address (host:port).
    pub server_addr: String,

    /// Local UDP port to receive samples and control messages on.
    pub bind_port: u16,

    /// Variable name attached to outgoing samples.
    pub var_name: String,

    /// Handshake timeout.
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            server_addr: String::from("127.0.0.1:47268"),
            bind_port: 0,
            var_name: String::from("led"),
            connect_timeout: Duration::from_secs(1),
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    pub enabled: bool,

    /// Size of the pass-duration histogram ring buffer.
    pub histogram_size: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            histogram_size: 10_000,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }

    /// Shortest interval among the configured periodic tasks.
    ///
    /// The poll loop should run at least this fast for timely firings.
    #[must_use]
    pub fn shortest_task_interval(&self) -> Duration {
        self.blink_interval.min(self.display_refresh_interval)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
