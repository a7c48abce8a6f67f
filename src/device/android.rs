//! Android capability over `adb` and Appium's UiAutomator2 driver

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::driver::{DriverServer, WebDriverClient};
use super::process::run_tool;
use super::{AppTarget, DeviceCapability, DeviceId};
use crate::common::config::{Config, HostPlatform, Platform};
use crate::common::paths::resolve_tool;
use crate::common::Result;

/// Install and readiness timeouts handed to the driver, in milliseconds
const DEVICE_TIMEOUT_MS: u64 = 300_000;

/// Parse `adb devices` output into serials
///
/// Skips the `List of devices attached` header, blank lines and daemon
/// start-up chatter (`* daemon not running; starting now ...`).
pub fn parse_adb_devices(lines: &[String]) -> Vec<DeviceId> {
    lines
        .iter()
        .map(|line| line.trim())
        .filter(|line| {
            !line.is_empty()
                && !line.starts_with("List ")
                && !line.starts_with('*')
                && !line.contains("daemon")
        })
        .filter_map(|line| line.split_whitespace().next())
        .map(|serial| DeviceId(serial.to_string()))
        .collect()
}

pub struct AndroidSession {
    adb: PathBuf,
    server: DriverServer,
    driver: WebDriverClient,
    session_settle: Duration,
}

impl AndroidSession {
    /// Build the session from config; fails if `adb` cannot be found
    pub fn new(config: &Config) -> Result<Self> {
        let adb = resolve_tool(config.android.adb.as_deref(), "adb")?;

        let mut envs = Vec::new();
        if let Some(java_home) = &config.android.java_home {
            envs.push(("JAVA_HOME".to_string(), java_home.display().to_string()));
        }
        if let Some(android_home) = &config.android.android_home {
            envs.push(("ANDROID_HOME".to_string(), android_home.display().to_string()));
        }

        Ok(Self {
            adb,
            server: DriverServer::new(config.driver.clone(), envs),
            driver: WebDriverClient::new(config.driver.endpoint()),
            session_settle: Duration::from_secs(config.driver.session_settle_secs),
        })
    }

    /// Session capabilities for the UiAutomator2 driver
    pub fn capabilities(device: &DeviceId, app: &AppTarget) -> Map<String, Value> {
        let mut caps = Map::new();
        caps.insert("platformName".into(), json!("Android"));
        caps.insert("appium:automationName".into(), json!("UiAutomator2"));
        caps.insert("appium:app".into(), json!(app.build.display().to_string()));
        caps.insert("appium:appPackage".into(), json!(app.bundle));
        caps.insert("appium:udid".into(), json!(device.as_str()));
        // 0 disables the idle timeout so long test runs keep the session
        caps.insert("appium:newCommandTimeout".into(), json!(0));
        for key in [
            "appium:androidInstallTimeout",
            "appium:autoWebviewTimeout",
            "appium:avdLaunchTimeout",
            "appium:avdReadyTimeout",
            "appium:deviceReadyTimeout",
            "appium:androidDeviceReadyTimeout",
        ] {
            caps.insert(key.into(), json!(DEVICE_TIMEOUT_MS));
        }
        caps
    }
}

#[async_trait]
impl DeviceCapability for AndroidSession {
    fn platform(&self) -> Platform {
        Platform::Android
    }

    async fn list_devices(&mut self) -> Result<Vec<DeviceId>> {
        let lines = run_tool(&self.adb, ["devices"]).await?;
        Ok(parse_adb_devices(&lines))
    }

    async fn setup_tunnel(
        &mut self,
        device: &DeviceId,
        local_port: u16,
        device_port: u16,
    ) -> Result<()> {
        run_tool(&self.adb, ["-s", device.as_str(), "forward", "--remove-all"]).await?;

        let local = format!("tcp:{}", local_port);
        let remote = format!("tcp:{}", device_port);
        run_tool(
            &self.adb,
            ["-s", device.as_str(), "forward", local.as_str(), remote.as_str()],
        )
        .await?;
        Ok(())
    }

    async fn start_driver_server(&mut self, host: HostPlatform) -> Result<()> {
        self.server.start(host).await
    }

    async fn stop_driver_server(&mut self) -> Result<()> {
        self.server.stop().await
    }

    async fn start_app_session(&mut self, device: &DeviceId, app: &AppTarget) -> Result<()> {
        self.driver
            .create_session(Self::capabilities(device, app))
            .await?;

        tracing::info!(
            settle_secs = self.session_settle.as_secs(),
            "Waiting for application to settle"
        );
        tokio::time::sleep(self.session_settle).await;
        Ok(())
    }

    async fn stop_app_session(&mut self) -> Result<()> {
        self.driver.delete_session().await
    }
}
