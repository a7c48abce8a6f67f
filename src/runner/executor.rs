//! Per-test execution through an external console runner

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;

use crate::common::config::RunnerConfig;
use crate::common::paths::resolve_tool;
use crate::common::{expand_test_args, Error, Result};

/// Runs one named test and returns its captured output
#[async_trait]
pub trait TestExecutor: Send {
    async fn run_test(&mut self, test: &str) -> Result<Vec<String>>;
}

/// An absent executor, for runs that skip the test stage
#[async_trait]
impl<T: TestExecutor> TestExecutor for Option<T> {
    async fn run_test(&mut self, test: &str) -> Result<Vec<String>> {
        match self {
            Some(executor) => executor.run_test(test).await,
            None => Err(Error::Config(format!(
                "no test runner configured to run '{}'",
                test
            ))),
        }
    }
}

/// Decides pass/fail from runner output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRule {
    pub sentinel: String,
    pub success_marker: String,
}

impl OutcomeRule {
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self {
            sentinel: config.sentinel.clone(),
            success_marker: config.success_marker.clone(),
        }
    }

    /// The first sentinel line decides; no sentinel means failure
    pub fn evaluate<S: AsRef<str>>(&self, output: &[S]) -> bool {
        for line in output {
            let line = line.as_ref();
            if line.contains(self.sentinel.as_str()) {
                return line.contains(self.success_marker.as_str());
            }
        }
        false
    }
}

impl Default for OutcomeRule {
    fn default() -> Self {
        Self::from_config(&RunnerConfig::default())
    }
}

/// Spawns the configured console runner once per test
pub struct ConsoleTestExecutor {
    program: PathBuf,
    args: Vec<String>,
}

impl ConsoleTestExecutor {
    pub fn new(program: PathBuf, args: Vec<String>) -> Self {
        Self { program, args }
    }

    /// Build from config; the runner must be set or on PATH
    pub fn from_config(config: &RunnerConfig) -> Result<Self> {
        let program = resolve_tool(config.program.as_deref(), "nunit3-console")?;
        Ok(Self::new(program, config.args.clone()))
    }
}

#[async_trait]
impl TestExecutor for ConsoleTestExecutor {
    async fn run_test(&mut self, test: &str) -> Result<Vec<String>> {
        let args = expand_test_args(&self.args, test);
        tracing::debug!(program = %self.program.display(), args = ?args, "Spawning test runner");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|e| Error::process_spawn(&self.program, &e))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::Internal("Failed to get test runner stdout".to_string()))?;

        let mut output = Vec::new();
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            tracing::debug!(test = %test, "{}", line);
            output.push(line);
        }

        // Failing tests exit non-zero; the sentinel line is what counts
        let status = child.wait().await?;
        tracing::debug!(test = %test, status = %status, "Test runner exited");

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_success() {
        let rule = OutcomeRule::default();
        let output = [
            "##teamcity[testStarted name='Smoke.Open']",
            "Test Run Summary",
            "  Overall result: Passed",
        ];
        assert!(rule.evaluate(&output));
    }

    #[test]
    fn test_sentinel_failure_and_missing() {
        let rule = OutcomeRule::default();
        assert!(!rule.evaluate(&["  Overall result: Failed"]));
        assert!(!rule.evaluate(&["Passed", "no summary here"]));
        assert!(!rule.evaluate::<&str>(&[]));
    }

    #[test]
    fn test_first_sentinel_wins() {
        let rule = OutcomeRule::default();
        assert!(!rule.evaluate(&["Overall result: Failed", "Overall result: Passed"]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_console_executor_substitutes_test_name() {
        let mut executor = ConsoleTestExecutor::new(
            PathBuf::from("sh"),
            vec![
                "-c".to_string(),
                "echo selected $0; echo 'Overall result: Passed'".to_string(),
                "{test}".to_string(),
            ],
        );
        let output = executor.run_test("Smoke.Menu.Open").await.unwrap();
        assert_eq!(output[0], "selected Smoke.Menu.Open");
        assert!(OutcomeRule::default().evaluate(&output));
    }

    #[tokio::test]
    async fn test_absent_executor_refuses_to_run() {
        let mut executor: Option<ConsoleTestExecutor> = None;
        let err = executor.run_test("Smoke.Open").await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_console_executor_spawn_failure() {
        let mut executor =
            ConsoleTestExecutor::new(PathBuf::from("/nonexistent/nunit-9d1a"), Vec::new());
        let err = executor.run_test("Smoke.Open").await.unwrap_err();
        assert!(matches!(err, Error::ProcessSpawn { .. }));
    }
}
