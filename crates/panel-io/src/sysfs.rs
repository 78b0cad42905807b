//! Linux sysfs GPIO board driver.
//!
//! Drives digital pins through the legacy `/sys/class/gpio` interface:
//! pins are exported on first use, configured as outputs or inputs on
//! demand, and unexported on shutdown. The panel display has no sysfs
//! counterpart, so display writes are mirrored to the log.
//!
//! The sysfs interface is deprecated in recent kernels in favor of the
//! character device API, but it remains the lowest-dependency way to drive
//! a pin and is still enabled on the SBC images this runtime targets.

use crate::{check_pin, check_row, clip_text, BoardDriver};
use panel_common::{PanelError, PanelResult};
use std::collections::HashSet;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default sysfs GPIO tree.
const DEFAULT_BASE: &str = "/sys/class/gpio";

/// Board driver backed by the Linux sysfs GPIO interface.
#[derive(Debug)]
pub struct SysfsGpioBoard {
    base: PathBuf,
    exported: HashSet<u8>,
    initialized: bool,
}

impl SysfsGpioBoard {
    /// Create a driver rooted at `/sys/class/gpio`.
    #[must_use]
    pub fn new() -> Self {
        Self::with_base(DEFAULT_BASE)
    }

    /// Create a driver rooted at a custom base path (for testing).
    pub fn with_base(base: impl Into<PathBuf>) -> Self {
        Self {
            base: base.into(),
            exported: HashSet::new(),
            initialized: false,
        }
    }

    fn pin_dir(&self, pin: u8) -> PathBuf {
        self.base.join(format!("gpio{pin}"))
    }

    fn write_file(path: &Path, contents: &str) -> PanelResult<()> {
        std::fs::write(path, contents)
            .map_err(|e| PanelError::Io(format!("write {}: {e}", path.display())))
    }

    fn read_file(path: &Path) -> PanelResult<String> {
        std::fs::read_to_string(path)
            .map_err(|e| PanelError::Io(format!("read {}: {e}", path.display())))
    }

    /// Export a pin and set its direction, if not already done.
    fn ensure_exported(&mut self, pin: u8, direction: &str) -> PanelResult<()> {
        if self.exported.contains(&pin) {
            return Ok(());
        }

        let export = self.base.join("export");
        if let Err(e) = std::fs::write(&export, pin.to_string()) {
            // EBUSY means the pin was already exported by someone else;
            // usable as long as the pin directory exists.
            if e.kind() != ErrorKind::ResourceBusy || !self.pin_dir(pin).exists() {
                return Err(PanelError::Io(format!(
                    "export pin {pin} via {}: {e}",
                    export.display()
                )));
            }
        }

        Self::write_file(&self.pin_dir(pin).join("direction"), direction)?;
        self.exported.insert(pin);
        debug!(pin, direction, "Exported GPIO pin");
        Ok(())
    }
}

impl Default for SysfsGpioBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl BoardDriver for SysfsGpioBoard {
    fn init(&mut self) -> PanelResult<()> {
        if !self.base.exists() {
            return Err(PanelError::Io(format!(
                "sysfs GPIO tree not found at {}",
                self.base.display()
            )));
        }
        self.initialized = true;
        info!(base = %self.base.display(), "Sysfs GPIO board initialized");
        Ok(())
    }

    fn set_digital_pin(&mut self, pin: u8, high: bool) -> PanelResult<()> {
        check_pin(pin)?;
        self.ensure_exported(pin, "out")?;
        Self::write_file(
            &self.pin_dir(pin).join("value"),
            if high { "1" } else { "0" },
        )
    }

    fn read_digital_pin(&self, pin: u8) -> PanelResult<bool> {
        check_pin(pin)?;
        let raw = Self::read_file(&self.pin_dir(pin).join("value"))?;
        Ok(raw.trim() == "1")
    }

    fn set_display_text(&mut self, row: u8, text: &str) -> PanelResult<()> {
        check_row(row)?;
        // No physical display behind sysfs; mirror to the log.
        info!(row, text = %clip_text(text), "display");
        Ok(())
    }

    fn shutdown(&mut self) -> PanelResult<()> {
        let unexport = self.base.join("unexport");
        for pin in self.exported.drain() {
            if let Err(e) = std::fs::write(&unexport, pin.to_string()) {
                warn!(pin, error = %e, "Failed to unexport GPIO pin");
            }
        }
        self.initialized = false;
        Ok(())
    }

    fn is_operational(&self) -> bool {
        self.initialized
    }
}
