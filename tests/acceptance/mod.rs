//! Acceptance test suite modules.

pub mod common;

mod config_test;
mod safety_test;
mod timing_test;
