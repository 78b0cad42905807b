//! Timing building blocks for the softpanel runtime.
//!
//! This crate provides the two pieces every cooperative polling loop needs:
//!
//! - **Clock** ([`clock`]): a monotonic time capability with a real
//!   implementation and a manually-driven one for tests
//! - **Interval timer** ([`interval`]): a non-blocking, drift-tolerant
//!   periodic trigger polled by the host loop
//!
//! # Example
//!
//! ```
//! use panel_blocks::clock::{ManualClock, MonotonicClock};
//! use panel_blocks::interval::IntervalTimer;
//! use std::time::Duration;
//!
//! let clock = ManualClock::new();
//! let mut blink = IntervalTimer::new(Duration::from_millis(500), clock.now());
//!
//! clock.advance(Duration::from_millis(499));
//! assert!(!blink.poll_and_consume(clock.now()));
//!
//! clock.advance(Duration::from_millis(1));
//! assert!(blink.poll_and_consume(clock.now()));
//! ```

pub mod clock;
pub mod interval;

// Re-export main types for convenience
pub use clock::{ManualClock, MonotonicClock, SystemClock};
pub use interval::IntervalTimer;
