//! CLI command definitions
//!
//! Defines the clap commands for the test runner CLI.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::common::config::{Config, Platform};

#[derive(Subcommand)]
pub enum Commands {
    /// Run the test plan on a connected device
    Run(RunArgs),

    /// Print the order of tests parsed from a plan file
    Plan {
        /// Path to the plan file (.json, .yaml or .yml)
        path: PathBuf,
    },

    /// List devices visible to the platform bridge
    Devices {
        /// Platform to query
        #[arg(long, value_enum)]
        platform: Option<Platform>,

        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Show the configuration file path and effective values
    Config {
        /// Configuration file
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

/// Options of `testrunner run`; each one overrides the configuration file
#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Configuration file (default: platform config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Target platform
    #[arg(long, value_enum)]
    pub platform: Option<Platform>,

    /// 1-based index of the device to run on
    #[arg(long)]
    pub device: Option<usize>,

    /// Plan file
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// Console test runner executable
    #[arg(long)]
    pub runner: Option<PathBuf>,

    /// Cumulative test output log
    #[arg(long)]
    pub log: Option<PathBuf>,

    /// Local end of the port forward
    #[arg(long)]
    pub port_local: Option<u16>,

    /// Device end of the port forward
    #[arg(long)]
    pub port_device: Option<u16>,

    /// Application build (.apk or .ipa)
    #[arg(long)]
    pub build: Option<PathBuf>,

    /// Package name or bundle id
    #[arg(long)]
    pub bundle: Option<String>,

    /// adb executable
    #[arg(long)]
    pub adb: Option<PathBuf>,

    /// Android SDK root, passed to Appium as ANDROID_HOME
    #[arg(long)]
    pub android_home: Option<PathBuf>,

    /// JDK root, passed to Appium as JAVA_HOME
    #[arg(long)]
    pub java_home: Option<PathBuf>,

    /// iOS device name capability
    #[arg(long)]
    pub device_name: Option<String>,

    /// iOS platform version capability
    #[arg(long)]
    pub ios_version: Option<String>,

    /// Xcode signing identity
    #[arg(long)]
    pub signing_id: Option<String>,

    /// Xcode development team id
    #[arg(long)]
    pub team_id: Option<String>,

    /// Do not set up the port forward
    #[arg(long)]
    pub skip_port_forward: bool,

    /// Do not start the Appium server
    #[arg(long)]
    pub skip_server_run: bool,

    /// Do not start the application session
    #[arg(long)]
    pub skip_session_run: bool,

    /// Do not run tests
    #[arg(long)]
    pub skip_tests: bool,

    /// Also run each suite's Enter/Exit methods as tests
    #[arg(long)]
    pub run_suite_hooks: bool,
}

impl RunArgs {
    /// Apply flag overrides on top of a loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(platform) = self.platform {
            config.general.platform = Some(platform);
        }
        if let Some(device) = self.device {
            config.general.device_index = device;
        }
        if let Some(plan) = &self.plan {
            config.plan.path = plan.clone();
        }
        if let Some(runner) = &self.runner {
            config.runner.program = Some(runner.clone());
        }
        if let Some(log) = &self.log {
            config.runner.log_path = log.clone();
        }
        if let Some(port) = self.port_local {
            config.tunnel.local_port = port;
        }
        if let Some(port) = self.port_device {
            config.tunnel.device_port = port;
        }
        if let Some(build) = &self.build {
            config.app.build = Some(build.clone());
        }
        if let Some(bundle) = &self.bundle {
            config.app.bundle = Some(bundle.clone());
        }

        if let Some(adb) = &self.adb {
            config.android.adb = Some(adb.clone());
        }
        if let Some(android_home) = &self.android_home {
            config.android.android_home = Some(android_home.clone());
        }
        if let Some(java_home) = &self.java_home {
            config.android.java_home = Some(java_home.clone());
        }
        if let Some(name) = &self.device_name {
            config.ios.device_name = Some(name.clone());
        }
        if let Some(version) = &self.ios_version {
            config.ios.platform_version = Some(version.clone());
        }
        if let Some(signing_id) = &self.signing_id {
            config.ios.signing_id = Some(signing_id.clone());
        }
        if let Some(team_id) = &self.team_id {
            config.ios.team_id = Some(team_id.clone());
        }

        // Flags can only turn skips on
        config.skip.tunnel |= self.skip_port_forward;
        config.skip.server |= self.skip_server_run;
        config.skip.session |= self.skip_session_run;
        config.skip.tests |= self.skip_tests;
        config.runner.run_suite_hooks |= self.run_suite_hooks;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_config() {
        let mut config = Config::default();
        config.skip.server = true;

        let args = RunArgs {
            platform: Some(Platform::Ios),
            device: Some(2),
            port_local: Some(14000),
            bundle: Some("com.example.app".into()),
            skip_tests: true,
            ..RunArgs::default()
        };
        args.apply(&mut config);

        assert_eq!(config.general.platform, Some(Platform::Ios));
        assert_eq!(config.general.device_index, 2);
        assert_eq!(config.tunnel.local_port, 14000);
        assert_eq!(config.tunnel.device_port, 13000);
        assert_eq!(config.app.bundle.as_deref(), Some("com.example.app"));
        assert!(config.skip.server);
        assert!(config.skip.tests);
        assert!(!config.skip.tunnel);
    }

    #[test]
    fn test_tooling_flags_override_config() {
        let mut config = Config::default();
        config.ios.team_id = Some("FILETEAM01".into());

        let args = RunArgs {
            adb: Some(PathBuf::from("/opt/sdk/platform-tools/adb")),
            java_home: Some(PathBuf::from("/usr/lib/jvm/17")),
            ios_version: Some("17.4".into()),
            signing_id: Some("Apple Development".into()),
            ..RunArgs::default()
        };
        args.apply(&mut config);

        assert_eq!(
            config.android.adb,
            Some(PathBuf::from("/opt/sdk/platform-tools/adb"))
        );
        assert_eq!(config.android.java_home, Some(PathBuf::from("/usr/lib/jvm/17")));
        assert!(config.android.android_home.is_none());
        assert_eq!(config.ios.platform_version.as_deref(), Some("17.4"));
        assert_eq!(config.ios.signing_id.as_deref(), Some("Apple Development"));
        assert_eq!(config.ios.team_id.as_deref(), Some("FILETEAM01"));
    }
}
