//! Test execution
//!
//! The orchestrator sequences a run; the executor and log handle each test.

mod executor;
mod log;
mod orchestrator;

pub use executor::{ConsoleTestExecutor, OutcomeRule, TestExecutor};
pub use log::RunLog;
pub use orchestrator::{Orchestrator, RunFailure, RunOutcome, RunSettings, SessionState};
