//! Appium server lifecycle and WebDriver sessions
//!
//! Shared by both platforms; only the launch environment and the session
//! capabilities differ.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tokio::process::Child;

use super::process::{spawn_background, stop_child};
use crate::common::config::{DriverConfig, HostPlatform};
use crate::common::paths::resolve_tool;
use crate::common::{Error, Result};

/// The Appium server process owned by a run
pub struct DriverServer {
    config: DriverConfig,
    envs: Vec<(String, String)>,
    child: Option<Child>,
}

impl DriverServer {
    pub fn new(config: DriverConfig, envs: Vec<(String, String)>) -> Self {
        Self {
            config,
            envs,
            child: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    /// Command line for the given host
    ///
    /// Windows hosts go through `cmd /C` since `appium` is a batch shim there.
    pub fn command_line(&self, host: HostPlatform) -> Result<(PathBuf, Vec<String>)> {
        let mut args = vec![
            "--address".to_string(),
            self.config.address.clone(),
            "--port".to_string(),
            self.config.port.to_string(),
            "--base-path".to_string(),
            self.config.base_path.clone(),
        ];

        match host {
            HostPlatform::Windows => {
                let program = self
                    .config
                    .program
                    .clone()
                    .unwrap_or_else(|| PathBuf::from("appium"));
                let mut cmd_args = vec!["/C".to_string(), program.display().to_string()];
                cmd_args.append(&mut args);
                Ok((PathBuf::from("cmd.exe"), cmd_args))
            }
            HostPlatform::Linux | HostPlatform::Osx => {
                let program = resolve_tool(self.config.program.as_deref(), "appium")?;
                Ok((program, args))
            }
        }
    }

    /// Start the server and wait the fixed settle delay
    pub async fn start(&mut self, host: HostPlatform) -> Result<()> {
        if self.child.is_some() {
            tracing::warn!("Driver server already running, not starting another");
            return Ok(());
        }

        let (program, args) = self.command_line(host)?;
        self.child = Some(spawn_background(&program, &args, &self.envs)?);

        let settle = self.config.server_settle_secs(host);
        tracing::info!(settle_secs = settle, "Waiting for driver server to settle");
        tokio::time::sleep(Duration::from_secs(settle)).await;

        if let Some(child) = self.child.as_mut() {
            if let Some(status) = child.try_wait()? {
                self.child = None;
                return Err(Error::ProcessFailed {
                    program: program.display().to_string(),
                    status: status.to_string(),
                    stderr: "driver server exited during startup".to_string(),
                });
            }
        }
        Ok(())
    }

    /// Stop the server; no-op if it was never started
    pub async fn stop(&mut self) -> Result<()> {
        match self.child.take() {
            Some(mut child) => {
                tracing::info!("Stopping driver server");
                stop_child(&mut child).await
            }
            None => Ok(()),
        }
    }
}

#[derive(Deserialize)]
struct NewSessionResponse {
    value: NewSessionValue,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewSessionValue {
    session_id: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

/// Minimal W3C WebDriver client for session lifecycle
pub struct WebDriverClient {
    http: reqwest::Client,
    endpoint: String,
    session_id: Option<String>,
}

impl WebDriverClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            session_id: None,
        }
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Request body for a new session
    pub fn new_session_body(capabilities: Map<String, Value>) -> Value {
        json!({ "capabilities": { "alwaysMatch": Value::Object(capabilities) } })
    }

    /// Create a session with the given capabilities
    pub async fn create_session(&mut self, capabilities: Map<String, Value>) -> Result<String> {
        if let Some(id) = &self.session_id {
            return Err(Error::Driver(format!("session {} already active", id)));
        }

        let url = format!("{}/session", self.endpoint);
        tracing::info!(url = %url, "Creating automation session");

        let response = self
            .http
            .post(&url)
            .json(&Self::new_session_body(capabilities))
            .send()
            .await?;
        let status = response.status();
        let body: NewSessionResponse = response.json().await.map_err(|e| {
            Error::Driver(format!("unexpected new session response ({}): {}", status, e))
        })?;

        match body.value.session_id {
            Some(id) if status.is_success() => {
                tracing::info!(session_id = %id, "Automation session created");
                self.session_id = Some(id.clone());
                Ok(id)
            }
            _ => Err(Error::Driver(format!(
                "session not created ({}): {}",
                body.value.error.unwrap_or_else(|| status.to_string()),
                body.value.message.unwrap_or_default()
            ))),
        }
    }

    /// Delete the active session; no-op without one
    pub async fn delete_session(&mut self) -> Result<()> {
        let Some(id) = self.session_id.take() else {
            return Ok(());
        };

        let url = format!("{}/session/{}", self.endpoint, id);
        tracing::info!(session_id = %id, "Deleting automation session");

        let response = self.http.delete(&url).send().await?;
        if !response.status().is_success() {
            return Err(Error::Driver(format!(
                "failed to delete session {}: {}",
                id,
                response.status()
            )));
        }
        Ok(())
    }
}
