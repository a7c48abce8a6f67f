//! Error types for the test runner
//!
//! Stage faults are caught by the orchestrator and reported; these variants
//! carry enough context for a useful console message.

use std::io;
use std::path::Path;
use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the test runner
#[derive(Error, Debug)]
pub enum Error {
    // === Configuration Errors ===
    #[error("Platform key needed to run test session. Use '--platform android' or '--platform ios'")]
    NoPlatform,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(String),

    // === Test Plan Errors ===
    #[error("Failed to parse test plan '{path}': {message}")]
    PlanParse { path: String, message: String },

    #[error("Invalid test plan: {0}")]
    PlanInvalid(String),

    // === Process Errors ===
    #[error("Tool '{name}' not found. Set its path in the config file or add it to PATH")]
    ToolNotFound { name: String },

    #[error("Failed to start '{program}': {error}")]
    ProcessSpawn { program: String, error: String },

    #[error("'{program}' exited with {status}: {stderr}")]
    ProcessFailed {
        program: String,
        status: String,
        stderr: String,
    },

    // === Driver Errors ===
    #[error("Automation driver error: {0}")]
    Driver(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to read file '{path}': {error}")]
    FileRead { path: String, error: String },

    #[error("Failed to write file '{path}': {error}")]
    FileWrite { path: String, error: String },

    // === Serialization Errors ===
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Internal Errors ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a plan parse error for the given file
    pub fn plan_parse(path: &Path, message: impl ToString) -> Self {
        Self::PlanParse {
            path: path.display().to_string(),
            message: message.to_string(),
        }
    }

    /// Create a process spawn error
    pub fn process_spawn(program: impl AsRef<Path>, error: &io::Error) -> Self {
        Self::ProcessSpawn {
            program: program.as_ref().display().to_string(),
            error: error.to_string(),
        }
    }

    /// Create a process failed error from an exit status and captured stderr
    pub fn process_failed(
        program: impl AsRef<Path>,
        status: std::process::ExitStatus,
        stderr: &[u8],
    ) -> Self {
        Self::ProcessFailed {
            program: program.as_ref().display().to_string(),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_string(),
        }
    }

    /// Whether this error was raised before any device interaction could start
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::NoPlatform | Self::Config(_) | Self::ConfigParse(_) | Self::ToolNotFound { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_parse_message_names_file() {
        let err = Error::plan_parse(Path::new("plans/smoke.json"), "expected value");
        let msg = err.to_string();
        assert!(msg.contains("plans/smoke.json"));
        assert!(msg.contains("expected value"));
    }

    #[test]
    fn test_configuration_classification() {
        assert!(Error::NoPlatform.is_configuration());
        assert!(Error::ToolNotFound { name: "adb".into() }.is_configuration());
        assert!(!Error::Driver("session refused".into()).is_configuration());
    }
}
