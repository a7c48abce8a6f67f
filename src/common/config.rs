//! Configuration file handling
//!
//! Every value has a default so a run can be driven from flags alone; the
//! TOML file only needs the keys that differ.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::paths::config_path;
use super::{Error, Result};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// Platform and device selection
    #[serde(default)]
    pub general: General,

    /// Local-to-device port forward
    #[serde(default)]
    pub tunnel: TunnelConfig,

    /// Per-stage skip flags
    #[serde(default)]
    pub skip: SkipConfig,

    /// Test plan location
    #[serde(default)]
    pub plan: PlanConfig,

    /// External test runner invocation
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Appium server settings
    #[serde(default)]
    pub driver: DriverConfig,

    /// Application under test
    #[serde(default)]
    pub app: AppConfig,

    /// Android tooling
    #[serde(default)]
    pub android: AndroidConfig,

    /// iOS tooling and signing
    #[serde(default)]
    pub ios: IosConfig,
}

/// Mobile platform the tests target
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Android,
    Ios,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Android => write!(f, "android"),
            Self::Ios => write!(f, "ios"),
        }
    }
}

/// Operating system of the machine hosting the driver server
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HostPlatform {
    Linux,
    Osx,
    Windows,
}

impl HostPlatform {
    /// Get the current host platform
    pub fn current() -> Self {
        #[cfg(target_os = "macos")]
        return HostPlatform::Osx;

        #[cfg(target_os = "windows")]
        return HostPlatform::Windows;

        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        return HostPlatform::Linux;
    }
}

impl Default for HostPlatform {
    fn default() -> Self {
        Self::current()
    }
}

/// Platform and device selection
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct General {
    /// Target platform; a run refuses to start without one
    #[serde(default)]
    pub platform: Option<Platform>,

    /// 1-based index into the discovered device list
    #[serde(default = "default_device_index")]
    pub device_index: usize,

    /// Host OS, decides how the driver server is launched
    #[serde(default)]
    pub host_platform: HostPlatform,
}

impl Default for General {
    fn default() -> Self {
        Self {
            platform: None,
            device_index: default_device_index(),
            host_platform: HostPlatform::current(),
        }
    }
}

fn default_device_index() -> usize {
    1
}

/// Port forward settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TunnelConfig {
    #[serde(default = "default_port")]
    pub local_port: u16,

    #[serde(default = "default_port")]
    pub device_port: u16,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            local_port: default_port(),
            device_port: default_port(),
        }
    }
}

fn default_port() -> u16 {
    13000
}

/// Stages that may be skipped when their work is done externally
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct SkipConfig {
    pub tunnel: bool,
    pub server: bool,
    pub session: bool,
    pub tests: bool,
}

/// Test plan settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlanConfig {
    #[serde(default = "default_plan_path")]
    pub path: PathBuf,
}

impl Default for PlanConfig {
    fn default() -> Self {
        Self {
            path: default_plan_path(),
        }
    }
}

fn default_plan_path() -> PathBuf {
    PathBuf::from("TestsTreeTemplate.json")
}

/// External test runner settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Console runner executable (e.g. nunit3-console)
    pub program: Option<PathBuf>,

    /// Arguments; `{test}` is replaced with the selected test name
    pub args: Vec<String>,

    /// Cumulative output log
    pub log_path: PathBuf,

    /// Substring identifying the overall result line
    pub sentinel: String,

    /// Substring on the sentinel line that marks success
    pub success_marker: String,

    /// Also run the `Enter`/`Exit` methods of suites as tests
    pub run_suite_hooks: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            program: None,
            args: vec![
                "--test={test}".to_string(),
                "--teamcity".to_string(),
                "TestsClient.dll".to_string(),
            ],
            log_path: PathBuf::from("tests-log.log"),
            sentinel: "Overall result".to_string(),
            success_marker: "Passed".to_string(),
            run_suite_hooks: false,
        }
    }
}

/// Appium server settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DriverConfig {
    /// Appium executable, looked up on PATH when unset
    #[serde(default)]
    pub program: Option<PathBuf>,

    #[serde(default = "default_driver_address")]
    pub address: String,

    #[serde(default = "default_driver_port")]
    pub port: u16,

    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Delay after starting the server; host dependent when unset
    #[serde(default)]
    pub settle_secs: Option<u64>,

    /// Delay after creating the app session
    #[serde(default = "default_session_settle")]
    pub session_settle_secs: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            program: None,
            address: default_driver_address(),
            port: default_driver_port(),
            base_path: default_base_path(),
            settle_secs: None,
            session_settle_secs: default_session_settle(),
        }
    }
}

fn default_driver_address() -> String {
    "127.0.0.1".to_string()
}
fn default_driver_port() -> u16 {
    4723
}
fn default_base_path() -> String {
    "/wd/hub".to_string()
}
fn default_session_settle() -> u64 {
    10
}

impl DriverConfig {
    /// Base URL of the WebDriver endpoint
    pub fn endpoint(&self) -> String {
        format!(
            "http://{}:{}/{}",
            self.address,
            self.port,
            self.base_path.trim_matches('/')
        )
        .trim_end_matches('/')
        .to_string()
    }

    /// Settle delay after the server was started on the given host
    pub fn server_settle_secs(&self, host: HostPlatform) -> u64 {
        self.settle_secs.unwrap_or(match host {
            HostPlatform::Windows => 5,
            _ => 10,
        })
    }
}

/// Application under test
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Path to the .apk or .ipa
    pub build: Option<PathBuf>,

    /// Package name (Android) or bundle id (iOS)
    pub bundle: Option<String>,
}

/// Android tooling
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AndroidConfig {
    pub adb: Option<PathBuf>,
    pub android_home: Option<PathBuf>,
    pub java_home: Option<PathBuf>,
}

/// iOS tooling and signing
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct IosConfig {
    pub idevice_id: Option<PathBuf>,
    pub iproxy: Option<PathBuf>,
    pub device_name: Option<String>,
    pub platform_version: Option<String>,
    pub team_id: Option<String>,
    pub signing_id: Option<String>,
}

impl Config {
    /// Load configuration
    ///
    /// An explicit path must exist. Without one the default config file is
    /// used if present, otherwise defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }

        if let Some(path) = config_path() {
            if path.exists() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    /// Parse a configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse(e.to_string()))
    }

    /// The selected platform
    pub fn platform(&self) -> Result<Platform> {
        self.general.platform.ok_or(Error::NoPlatform)
    }

    /// Render the effective configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Internal(e.to_string()))
    }
}
