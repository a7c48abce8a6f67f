//! Mobile UI test-plan runner
//!
//! Linearizes a hierarchical test plan, prepares an Android or iOS device
//! through Appium, runs every test with an external console runner and
//! reports a tree of results.

pub mod cli;
pub mod commands;
pub mod common;
pub mod device;
pub mod plan;
pub mod report;
pub mod runner;

// Re-export commonly used types for tests
pub use common::{Error, Result};
