//! Session orchestration state machine
//!
//! Drives one run forward through device discovery, tunnel, driver server,
//! app session and the test loop, then always tears down. Stage faults are
//! logged and end the forward sequence; they never escape `run`.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;

use futures_util::FutureExt;

use super::executor::{OutcomeRule, TestExecutor};
use super::log::RunLog;
use crate::common::config::{Config, HostPlatform, SkipConfig};
use crate::common::{Error, Result};
use crate::device::{AppTarget, DeviceCapability, DeviceId, Discovery};
use crate::plan::{InvocationEntry, InvocationList};
use crate::report::ResultMap;

/// Run lifecycle state
///
/// Ordered: a run only ever moves forward, and always ends in `TornDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Idle,
    DeviceConnected,
    PortForwarded,
    ServerRunning,
    AppSessionRunning,
    TestsRunning,
    TornDown,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::DeviceConnected => write!(f, "device connected"),
            Self::PortForwarded => write!(f, "port forwarded"),
            Self::ServerRunning => write!(f, "server running"),
            Self::AppSessionRunning => write!(f, "app session running"),
            Self::TestsRunning => write!(f, "tests running"),
            Self::TornDown => write!(f, "torn down"),
        }
    }
}

/// Already-resolved values a run needs
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub device_index: usize,
    pub host_platform: HostPlatform,
    pub local_port: u16,
    pub device_port: u16,
    pub skip: SkipConfig,
    /// Required unless the session stage is skipped
    pub app: Option<AppTarget>,
    pub log_path: PathBuf,
    pub outcome: OutcomeRule,
    pub run_suite_hooks: bool,
}

impl RunSettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        let app = if config.skip.session {
            None
        } else {
            Some(AppTarget::from_config(config)?)
        };

        Ok(Self {
            device_index: config.general.device_index,
            host_platform: config.general.host_platform,
            local_port: config.tunnel.local_port,
            device_port: config.tunnel.device_port,
            skip: config.skip,
            app,
            log_path: config.runner.log_path.clone(),
            outcome: OutcomeRule::from_config(&config.runner),
            run_suite_hooks: config.runner.run_suite_hooks,
        })
    }
}

/// Why a run stopped before completing every stage
#[derive(Debug)]
pub enum RunFailure {
    /// Discovery found no device at the requested index
    DeviceNotFound(String),
    /// A stage returned an error
    Fault { stage: SessionState, error: Error },
    /// A stage panicked
    Panicked { stage: SessionState, message: String },
}

impl fmt::Display for RunFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceNotFound(reason) => write!(f, "{}", reason),
            Self::Fault { stage, error } => write!(f, "failed reaching '{}': {}", stage, error),
            Self::Panicked { stage, message } => {
                write!(f, "panicked reaching '{}': {}", stage, message)
            }
        }
    }
}

/// Result of a complete orchestration run
#[derive(Debug)]
pub struct RunOutcome {
    /// Last state reached before teardown
    pub reached: SessionState,
    /// Always `TornDown`
    pub final_state: SessionState,
    pub results: ResultMap,
    pub failure: Option<RunFailure>,
}

impl RunOutcome {
    pub fn completed(&self) -> bool {
        self.failure.is_none()
    }
}

/// Sequences one run against a device capability
pub struct Orchestrator<C, E> {
    capability: C,
    executor: E,
    settings: RunSettings,
    state: SessionState,
    /// Owned here, not by the test loop, so output survives a panic
    log: Option<RunLog>,
}

impl<C: DeviceCapability, E: TestExecutor> Orchestrator<C, E> {
    pub fn new(capability: C, executor: E, settings: RunSettings) -> Self {
        Self {
            capability,
            executor,
            settings,
            state: SessionState::Idle,
            log: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Execute the run; teardown happens exactly once on every path
    pub async fn run(mut self, plan: &InvocationList) -> RunOutcome {
        tracing::info!(platform = %self.capability.platform(), "Starting run");
        let mut results = ResultMap::new();

        let forward = AssertUnwindSafe(self.advance(plan, &mut results))
            .catch_unwind()
            .await;

        let failure = match forward {
            Ok(Ok(())) => None,
            Ok(Err(failure)) => Some(failure),
            Err(panic) => Some(RunFailure::Panicked {
                stage: self.next_state(),
                message: panic_message(panic.as_ref()),
            }),
        };

        match &failure {
            None => tracing::info!("All stages completed"),
            Some(RunFailure::DeviceNotFound(reason)) => {
                tracing::warn!(reason = %reason, "No device to run tests on")
            }
            Some(failure) => tracing::error!(state = %self.state, "Run aborted: {}", failure),
        }

        self.flush_log().await;

        let reached = self.state;
        self.teardown().await;

        RunOutcome {
            reached,
            final_state: self.state,
            results,
            failure,
        }
    }

    async fn advance(
        &mut self,
        plan: &InvocationList,
        results: &mut ResultMap,
    ) -> std::result::Result<(), RunFailure> {
        let device = match self
            .capability
            .discover_device(self.settings.device_index)
            .await
            .map_err(|e| self.fault(e))?
        {
            Discovery::Found(device) => device,
            Discovery::NotFound(reason) => return Err(RunFailure::DeviceNotFound(reason)),
        };
        tracing::info!(device = %device, index = self.settings.device_index, "Device selected");
        self.transition(SessionState::DeviceConnected);

        if self.settings.skip.tunnel {
            tracing::info!("Skipping port forwarding");
        } else {
            self.capability
                .setup_tunnel(&device, self.settings.local_port, self.settings.device_port)
                .await
                .map_err(|e| self.fault(e))?;
        }
        self.transition(SessionState::PortForwarded);

        if self.settings.skip.server {
            tracing::info!("Skipping driver server start");
        } else {
            self.capability
                .start_driver_server(self.settings.host_platform)
                .await
                .map_err(|e| self.fault(e))?;
        }
        self.transition(SessionState::ServerRunning);

        if self.settings.skip.session {
            tracing::info!("Skipping application session start");
        } else {
            self.start_session(&device).await.map_err(|e| self.fault(e))?;
        }
        self.transition(SessionState::AppSessionRunning);

        if self.settings.skip.tests {
            tracing::info!("Skipping tests");
        } else {
            self.run_tests(plan, results).await.map_err(|e| self.fault(e))?;
        }
        self.transition(SessionState::TestsRunning);

        Ok(())
    }

    async fn start_session(&mut self, device: &DeviceId) -> Result<()> {
        let app = self.settings.app.clone().ok_or_else(|| {
            Error::Config("application build and bundle are required to start a session".into())
        })?;
        self.capability.start_app_session(device, &app).await
    }

    async fn run_tests(&mut self, plan: &InvocationList, results: &mut ResultMap) -> Result<()> {
        self.log = Some(RunLog::open(&self.settings.log_path).await?);

        for entry in plan {
            if entry.is_bracket() && !self.settings.run_suite_hooks {
                continue;
            }

            let selector = entry.selector();
            tracing::info!(test = %selector, "Executing test");

            let output = self.executor.run_test(&selector).await?;
            if let Some(log) = self.log.as_mut() {
                log.append(&output).await?;
            }

            let passed = self.settings.outcome.evaluate(&output);
            results.record(entry, passed);
            log_outcome(entry, passed);
        }
        Ok(())
    }

    /// Write out buffered test output, whatever ended the test loop
    async fn flush_log(&mut self) {
        let Some(mut log) = self.log.take() else {
            return;
        };
        let path = log.path().display().to_string();
        match log.flush().await {
            Ok(()) => tracing::info!(log = %path, "Test output written"),
            Err(e) => tracing::warn!(log = %path, error = %e, "Failed to flush test output"),
        }
    }

    /// Stop everything that may have started; each stop tolerates never
    /// having been started, and a failing or panicking stop does not
    /// prevent the others
    async fn teardown(&mut self) {
        tracing::info!(from = %self.state, "Tearing down");

        stop_step("stop application session", self.capability.stop_app_session()).await;
        stop_step("stop driver server", self.capability.stop_driver_server()).await;
        stop_step("close tunnel", self.capability.close_tunnel()).await;

        self.state = SessionState::TornDown;
    }

    fn transition(&mut self, to: SessionState) {
        debug_assert!(to > self.state, "state must advance: {} -> {}", self.state, to);
        tracing::debug!(from = %self.state, to = %to, "State transition");
        self.state = to;
    }

    /// The state the run was trying to reach
    fn next_state(&self) -> SessionState {
        match self.state {
            SessionState::Idle => SessionState::DeviceConnected,
            SessionState::DeviceConnected => SessionState::PortForwarded,
            SessionState::PortForwarded => SessionState::ServerRunning,
            SessionState::ServerRunning => SessionState::AppSessionRunning,
            SessionState::AppSessionRunning => SessionState::TestsRunning,
            SessionState::TestsRunning | SessionState::TornDown => SessionState::TornDown,
        }
    }

    fn fault(&self, error: Error) -> RunFailure {
        RunFailure::Fault {
            stage: self.next_state(),
            error,
        }
    }
}

async fn stop_step<F>(action: &str, step: F)
where
    F: Future<Output = Result<()>>,
{
    match AssertUnwindSafe(step).catch_unwind().await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::warn!(error = %e, "Failed to {}", action),
        Err(panic) => tracing::warn!(
            panic = %panic_message(panic.as_ref()),
            "Panicked trying to {}",
            action
        ),
    }
}

fn log_outcome(entry: &InvocationEntry, passed: bool) {
    if passed {
        tracing::info!(test = %entry, "Test passed");
    } else {
        tracing::warn!(test = %entry, "Test failed");
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_states_are_ordered() {
        assert!(SessionState::Idle < SessionState::DeviceConnected);
        assert!(SessionState::AppSessionRunning < SessionState::TestsRunning);
        assert!(SessionState::TestsRunning < SessionState::TornDown);
    }

    #[test]
    fn test_settings_require_app_unless_session_skipped() {
        let mut config = Config::default();
        assert!(matches!(RunSettings::from_config(&config), Err(Error::Config(_))));

        config.skip.session = true;
        let settings = RunSettings::from_config(&config).unwrap();
        assert!(settings.app.is_none());
        assert_eq!(settings.device_index, 1);
        assert_eq!(settings.outcome, OutcomeRule::default());
    }

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn Any + Send> = Box::new("stage exploded");
        assert_eq!(panic_message(boxed.as_ref()), "stage exploded");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("owned"));
        assert_eq!(panic_message(boxed.as_ref()), "owned");
    }
}
