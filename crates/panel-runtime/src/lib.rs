#![doc = "Cooperative polling engine for the softpanel runtime."]

pub mod scheduler;
pub mod task;
pub mod watchdog;

pub use scheduler::*;
pub use task::*;
pub use watchdog::*;
