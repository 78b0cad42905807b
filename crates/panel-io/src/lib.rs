//! Board abstractions for the panel runtime.
//!
//! This crate provides:
//! - [`BoardDriver`] trait for abstracting pin and display access
//! - [`SimulatedBoard`] in-memory driver for tests and development
//! - [`sysfs`] module with a Linux sysfs GPIO driver

pub mod sysfs;

pub use sysfs::SysfsGpioBoard;

use panel_common::{PanelError, PanelResult};

/// Number of digital pins a board exposes.
pub const PIN_COUNT: u8 = 32;

/// Number of text rows on the panel display.
pub const DISPLAY_ROWS: u8 = 4;

/// Number of character columns per display row.
pub const DISPLAY_COLS: usize = 16;

/// Board driver abstraction.
///
/// The polling loop talks to the panel hardware only through this trait,
/// so the same tasks run against real GPIO or an in-memory board.
pub trait BoardDriver: Send {
    /// Initialize the board.
    ///
    /// This should claim pins, configure directions, and clear the display.
    fn init(&mut self) -> PanelResult<()>;

    /// Drive a digital pin high or low.
    fn set_digital_pin(&mut self, pin: u8, high: bool) -> PanelResult<()>;

    /// Read the current level of a digital pin.
    fn read_digital_pin(&self, pin: u8) -> PanelResult<bool>;

    /// Write a text row on the panel display.
    ///
    /// Text longer than [`DISPLAY_COLS`] is truncated to the row width.
    fn set_display_text(&mut self, row: u8, text: &str) -> PanelResult<()>;

    /// Shutdown the board gracefully, releasing claimed resources.
    fn shutdown(&mut self) -> PanelResult<()>;

    /// Check if the board is initialized and usable.
    fn is_operational(&self) -> bool {
        true
    }
}

/// Validate a pin index against the board's pin bank.
fn check_pin(pin: u8) -> PanelResult<()> {
    if pin < PIN_COUNT {
        Ok(())
    } else {
        Err(PanelError::PinOutOfRange {
            pin,
            max: PIN_COUNT,
        })
    }
}

/// Validate a display row index.
fn check_row(row: u8) -> PanelResult<()> {
    if row < DISPLAY_ROWS {
        Ok(())
    } else {
        Err(PanelError::RowOutOfRange {
            row,
            rows: DISPLAY_ROWS,
        })
    }
}

/// Truncate display text to the row width, respecting char boundaries.
fn clip_text(text: &str) -> String {
    text.chars().take(DISPLAY_COLS).collect()
}

/// Simulated board for testing.
///
/// Stores pin levels and display rows in memory and exposes them for
/// inspection by tests.
#[derive(Debug, Default)]
pub struct SimulatedBoard {
    initialized: bool,
    pins: [bool; PIN_COUNT as usize],
    display: [String; DISPLAY_ROWS as usize],
}

impl SimulatedBoard {
    /// Create a new simulated board with all pins low and a blank display.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect a pin level without going through the driver API (for testing).
    #[must_use]
    pub fn pin(&self, pin: u8) -> bool {
        self.pins.get(pin as usize).copied().unwrap_or(false)
    }

    /// Inspect a display row (for testing).
    #[must_use]
    pub fn display_row(&self, row: u8) -> &str {
        self.display
            .get(row as usize)
            .map_or("", String::as_str)
    }
}

impl BoardDriver for SimulatedBoard {
    fn init(&mut self) -> PanelResult<()> {
        self.initialized = true;
        self.pins = [false; PIN_COUNT as usize];
        for row in &mut self.display {
            row.clear();
        }
        Ok(())
    }

    fn set_digital_pin(&mut self, pin: u8, high: bool) -> PanelResult<()> {
        check_pin(pin)?;
        self.pins[pin as usize] = high;
        Ok(())
    }

    fn read_digital_pin(&self, pin: u8) -> PanelResult<bool> {
        check_pin(pin)?;
        Ok(self.pins[pin as usize])
    }

    fn set_display_text(&mut self, row: u8, text: &str) -> PanelResult<()> {
        check_row(row)?;
        self.display[row as usize] = clip_text(text);
        Ok(())
    }

    fn shutdown(&mut self) -> PanelResult<()> {
        self.initialized = false;
        Ok(())
    }

    fn is_operational(&self) -> bool {
        self.initialized
    }
}
