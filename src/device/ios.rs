//! iOS capability over libimobiledevice and Appium's XCUITest driver

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::process::Child;

use super::driver::{DriverServer, WebDriverClient};
use super::process::{run_tool, spawn_background, stop_child};
use super::{AppTarget, DeviceCapability, DeviceId};
use crate::common::config::{Config, HostPlatform, IosConfig, Platform};
use crate::common::paths::resolve_tool;
use crate::common::Result;

/// Parse `idevice_id -l` output, one UDID per line
pub fn parse_idevice_ids(lines: &[String]) -> Vec<DeviceId> {
    lines
        .iter()
        .filter_map(|line| line.split_whitespace().next())
        .map(|udid| DeviceId(udid.to_string()))
        .collect()
}

pub struct IosSession {
    idevice_id: PathBuf,
    iproxy: Option<PathBuf>,
    ios: IosConfig,
    tunnel: Option<Child>,
    server: DriverServer,
    driver: WebDriverClient,
    session_settle: Duration,
}

impl IosSession {
    /// Build the session from config; fails if `idevice_id` cannot be found
    pub fn new(config: &Config) -> Result<Self> {
        let idevice_id = resolve_tool(config.ios.idevice_id.as_deref(), "idevice_id")?;

        Ok(Self {
            idevice_id,
            iproxy: config.ios.iproxy.clone(),
            ios: config.ios.clone(),
            tunnel: None,
            server: DriverServer::new(config.driver.clone(), Vec::new()),
            driver: WebDriverClient::new(config.driver.endpoint()),
            session_settle: Duration::from_secs(config.driver.session_settle_secs),
        })
    }

    /// Session capabilities for the XCUITest driver
    pub fn capabilities(ios: &IosConfig, device: &DeviceId, app: &AppTarget) -> Map<String, Value> {
        let mut caps = Map::new();
        caps.insert("platformName".into(), json!("iOS"));
        caps.insert("appium:automationName".into(), json!("XCUITest"));
        caps.insert("appium:app".into(), json!(app.build.display().to_string()));
        caps.insert("appium:bundleId".into(), json!(app.bundle));
        caps.insert("appium:udid".into(), json!(device.as_str()));
        caps.insert("appium:newCommandTimeout".into(), json!(0));
        // Suites relaunch the app themselves; a reinstall would wipe state
        caps.insert("appium:noReset".into(), json!(true));

        let optional = [
            ("appium:deviceName", &ios.device_name),
            ("appium:platformVersion", &ios.platform_version),
            ("appium:xcodeOrgId", &ios.team_id),
            ("appium:xcodeSigningId", &ios.signing_id),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                caps.insert(key.into(), json!(value));
            }
        }
        caps
    }
}

#[async_trait]
impl DeviceCapability for IosSession {
    fn platform(&self) -> Platform {
        Platform::Ios
    }

    async fn list_devices(&mut self) -> Result<Vec<DeviceId>> {
        let lines = run_tool(&self.idevice_id, ["-l"]).await?;
        Ok(parse_idevice_ids(&lines))
    }

    async fn setup_tunnel(
        &mut self,
        device: &DeviceId,
        local_port: u16,
        device_port: u16,
    ) -> Result<()> {
        // iproxy forwards live as long as the process; replace ours
        self.close_tunnel().await?;

        let iproxy = resolve_tool(self.iproxy.as_deref(), "iproxy")?;
        let args = [
            local_port.to_string(),
            device_port.to_string(),
            "-u".to_string(),
            device.to_string(),
        ];
        self.tunnel = Some(spawn_background(&iproxy, &args, &[])?);
        Ok(())
    }

    async fn close_tunnel(&mut self) -> Result<()> {
        match self.tunnel.take() {
            Some(mut child) => {
                tracing::info!("Stopping iproxy tunnel");
                stop_child(&mut child).await
            }
            None => Ok(()),
        }
    }

    async fn start_driver_server(&mut self, host: HostPlatform) -> Result<()> {
        self.server.start(host).await
    }

    async fn stop_driver_server(&mut self) -> Result<()> {
        self.server.stop().await
    }

    async fn start_app_session(&mut self, device: &DeviceId, app: &AppTarget) -> Result<()> {
        self.driver
            .create_session(Self::capabilities(&self.ios, device, app))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_idevice_ids() {
        let lines = vec![
            "00008030-001A35E11E88802E".to_string(),
            String::new(),
            "  00008101-000255021E08001E  ".to_string(),
        ];
        assert_eq!(
            parse_idevice_ids(&lines),
            vec![
                DeviceId("00008030-001A35E11E88802E".into()),
                DeviceId("00008101-000255021E08001E".into())
            ]
        );
    }

    #[test]
    fn test_capabilities_include_signing_when_set() {
        let ios = IosConfig {
            device_name: Some("QA iPhone".into()),
            team_id: Some("ABCDE12345".into()),
            ..IosConfig::default()
        };
        let app = AppTarget {
            build: PathBuf::from("app.ipa"),
            bundle: "com.example.drawing".into(),
        };
        let caps = IosSession::capabilities(&ios, &DeviceId("udid-1".into()), &app);

        assert_eq!(caps["platformName"], "iOS");
        assert_eq!(caps["appium:bundleId"], "com.example.drawing");
        assert_eq!(caps["appium:deviceName"], "QA iPhone");
        assert_eq!(caps["appium:xcodeOrgId"], "ABCDE12345");
        assert_eq!(caps["appium:noReset"], true);
        assert!(!caps.contains_key("appium:platformVersion"));
    }
}
