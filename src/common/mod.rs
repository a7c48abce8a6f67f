//! Common utilities shared by the CLI and the orchestrator

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use config::Config;
pub use error::{Error, Result};

/// Replace every `{test}` placeholder in an argument template
pub fn expand_test_args(template: &[String], test: &str) -> Vec<String> {
    template
        .iter()
        .map(|arg| arg.replace("{test}", test))
        .collect()
}
