use thiserror::Error;

/// Panel error types covering configuration, runtime faults, and board failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PanelError {
    /// Configuration or initialization error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic runtime fault.
    #[error("runtime fault: {0}")]
    Fault(String),

    /// Watchdog timer expired without being kicked.
    #[error("watchdog timeout: {0}")]
    WatchdogTimeout(String),

    /// Board access error (pin or display operation failed).
    #[error("board error: {0}")]
    Board(String),

    /// Pin index outside the board's pin bank.
    #[error("pin {pin} out of range (board has {max} pins)")]
    PinOutOfRange {
        /// Requested pin index.
        pin: u8,
        /// Number of pins the board exposes.
        max: u8,
    },

    /// Display row outside the panel's row count.
    #[error("display row {row} out of range (display has {rows} rows)")]
    RowOutOfRange {
        /// Requested row index.
        row: u8,
        /// Number of rows the display exposes.
        rows: u8,
    },

    /// I/O operation error.
    #[error("I/O error: {0}")]
    Io(String),

    /// Telemetry link error.
    #[error("telemetry error: {0}")]
    Telemetry(String),

    /// Invalid state transition attempted.
    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition {
        /// Source state.
        from: String,
        /// Attempted target state.
        to: String,
    },
}

/// Convenience type alias for panel operations.
pub type PanelResult<T> = Result<T, PanelError>;
