//! Configuration paths and external tool lookup

use std::path::{Path, PathBuf};

use super::{Error, Result};

/// Name used for the configuration directory
const APP_NAME: &str = "mobile-tests-runner";

/// Get the configuration directory path
///
/// Uses the directories crate for platform-appropriate locations:
/// - Linux: `~/.config/mobile-tests-runner/`
/// - macOS: `~/Library/Application Support/mobile-tests-runner/`
/// - Windows: `%APPDATA%\mobile-tests-runner\`
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME)
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the default configuration file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join("config.toml"))
}

/// Resolve an external tool
///
/// An explicitly configured path wins; otherwise the tool is searched on PATH.
pub fn resolve_tool(configured: Option<&Path>, name: &str) -> Result<PathBuf> {
    if let Some(path) = configured {
        return Ok(path.to_path_buf());
    }

    which::which(name).map_err(|_| Error::ToolNotFound {
        name: name.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_is_toml() {
        if let Some(path) = config_path() {
            assert_eq!(path.file_name().unwrap(), "config.toml");
        }
    }

    #[test]
    fn test_configured_tool_path_wins() {
        let path = resolve_tool(Some(Path::new("/opt/sdk/adb")), "adb").unwrap();
        assert_eq!(path, PathBuf::from("/opt/sdk/adb"));
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let err = resolve_tool(None, "definitely-not-a-real-tool-4f1c").unwrap_err();
        assert!(matches!(err, Error::ToolNotFound { .. }));
    }
}
