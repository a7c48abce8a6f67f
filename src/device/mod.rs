//! Device capabilities
//!
//! Everything the orchestrator needs from a platform: finding the device,
//! forwarding a port to it, and the driver-server and app-session
//! lifecycles. `AndroidSession` and `IosSession` are the two
//! implementations; a run picks one at startup.

mod android;
pub mod driver;
mod ios;
pub mod process;

use std::fmt;
use std::path::PathBuf;

use async_trait::async_trait;

use crate::common::config::{Config, HostPlatform, Platform};
use crate::common::{Error, Result};

pub use android::{parse_adb_devices, AndroidSession};
pub use ios::{parse_idevice_ids, IosSession};

/// Identifier of an attached device (adb serial or iOS UDID)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DeviceId(pub String);

impl DeviceId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of device discovery
///
/// Not finding a device is an expected result, not a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Discovery {
    Found(DeviceId),
    NotFound(String),
}

/// Application to install and launch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppTarget {
    /// Path to the .apk or .ipa
    pub build: PathBuf,
    /// Package name or bundle id
    pub bundle: String,
}

impl AppTarget {
    /// Build the target from config; both keys are required
    pub fn from_config(config: &Config) -> Result<Self> {
        let build = config.app.build.clone().ok_or_else(|| {
            Error::Config("application build path not set (use --build or [app] build)".to_string())
        })?;
        let bundle = config.app.bundle.clone().ok_or_else(|| {
            Error::Config("application bundle not set (use --bundle or [app] bundle)".to_string())
        })?;
        Ok(Self { build, bundle })
    }
}

/// Select a device by 1-based index
pub fn select_device(devices: &[DeviceId], index: usize) -> Discovery {
    if devices.is_empty() {
        return Discovery::NotFound("No devices connected to execute tests".to_string());
    }

    match index.checked_sub(1).and_then(|i| devices.get(i)) {
        Some(device) => Discovery::Found(device.clone()),
        None => Discovery::NotFound(format!(
            "Not enough devices to execute with target device number {} ({} connected)",
            index,
            devices.len()
        )),
    }
}

/// Platform operations the orchestrator drives
///
/// Every `stop_*` call must be safe when the matching start never happened.
#[async_trait]
pub trait DeviceCapability: Send {
    fn platform(&self) -> Platform;

    /// Enumerate attached devices in the order the bridge tool reports them
    async fn list_devices(&mut self) -> Result<Vec<DeviceId>>;

    /// Pick the device at the 1-based `index`
    async fn discover_device(&mut self, index: usize) -> Result<Discovery> {
        let devices = self.list_devices().await?;
        tracing::info!(
            platform = %self.platform(),
            devices = ?devices.iter().map(DeviceId::as_str).collect::<Vec<_>>(),
            "Device IDs found"
        );
        Ok(select_device(&devices, index))
    }

    /// Clear existing forwards for the device, then install the requested one
    async fn setup_tunnel(&mut self, device: &DeviceId, local_port: u16, device_port: u16)
        -> Result<()>;

    /// Release the tunnel if it is held by a process of ours
    async fn close_tunnel(&mut self) -> Result<()> {
        Ok(())
    }

    async fn start_driver_server(&mut self, host: HostPlatform) -> Result<()>;

    async fn stop_driver_server(&mut self) -> Result<()>;

    async fn start_app_session(&mut self, device: &DeviceId, app: &AppTarget) -> Result<()>;

    async fn stop_app_session(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<DeviceId> {
        names.iter().map(|n| DeviceId(n.to_string())).collect()
    }

    #[test]
    fn test_select_device_in_range() {
        let devices = ids(&["emulator-5554", "R58M123"]);
        assert_eq!(
            select_device(&devices, 1),
            Discovery::Found(DeviceId("emulator-5554".into()))
        );
        assert_eq!(
            select_device(&devices, 2),
            Discovery::Found(DeviceId("R58M123".into()))
        );
    }

    #[test]
    fn test_select_device_out_of_range() {
        let devices = ids(&["emulator-5554", "R58M123"]);
        assert!(matches!(select_device(&devices, 0), Discovery::NotFound(_)));
        assert!(matches!(select_device(&devices, 3), Discovery::NotFound(_)));
        assert!(matches!(select_device(&[], 1), Discovery::NotFound(_)));
    }

    #[test]
    fn test_app_target_requires_build_and_bundle() {
        let mut config = Config::default();
        assert!(matches!(AppTarget::from_config(&config), Err(Error::Config(_))));

        config.app.build = Some(PathBuf::from("app.apk"));
        config.app.bundle = Some("com.example.app".into());
        let target = AppTarget::from_config(&config).unwrap();
        assert_eq!(target.bundle, "com.example.app");
    }
}
