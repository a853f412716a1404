//! Settings management for the opshell daemon.
//!
//! Settings are loaded from TOML files in the following locations (in order):
//! 1. the path in the `OPSHELL_CONFIG` environment variable, if set
//! 2. platform config dir, e.g. `~/.config/opshell/settings.toml`
//! 3. `~/.config/opshell/settings.toml` (explicit Unix-style fallback)
//! 4. `./settings.toml` (current directory, for development)

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Main settings structure for the opshell daemon.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Session and permission settings.
    pub session: SessionSettings,
    /// Window geometry defaults.
    pub windows: WindowSettings,
    /// Behavior settings.
    pub behavior: BehaviorSettings,
}

/// Session-level settings controlling permissions and operating mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Run in closed mode: the layout is fixed and may not be changed by the operator.
    #[serde(default = "default_false")]
    pub closed_mode: bool,

    /// Whether the logged-on user holds the configure right.
    #[serde(default = "default_true")]
    pub user_has_configure_right: bool,

    /// Client identification string reported to content windows.
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Active UI language.
    #[serde(default = "default_language")]
    pub active_language: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            closed_mode: false,
            user_has_configure_right: true,
            client_id: default_client_id(),
            active_language: default_language(),
        }
    }
}

/// Default geometry for newly created manager windows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    /// Default width for new manager windows in pixels.
    #[serde(default = "default_window_width")]
    pub default_width: i32,

    /// Default height for new manager windows in pixels.
    #[serde(default = "default_window_height")]
    pub default_height: i32,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            default_width: default_window_width(),
            default_height: default_window_height(),
        }
    }
}

/// Behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorSettings {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// TCP port the shell listens on for content-window connections.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for BehaviorSettings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            port: default_port(),
        }
    }
}

// Default value functions for serde
fn default_false() -> bool {
    false
}

fn default_true() -> bool {
    true
}

fn default_client_id() -> String {
    "opshell".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

fn default_window_width() -> i32 {
    1200
}

fn default_window_height() -> i32 {
    800
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> u16 {
    opshell_ipc::DEFAULT_PORT
}

impl Settings {
    /// Load settings from standard locations.
    ///
    /// Returns default settings if no file is found.
    pub fn load() -> Result<Self> {
        let paths = settings_paths();

        for path in &paths {
            if path.exists() {
                tracing::info!("Loading settings from: {}", path.display());
                return Self::load_from_path(path);
            }
        }

        tracing::info!("No settings file found, using defaults");
        Ok(Self::default())
    }

    /// Load settings from a specific path.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings file: {}", path.display()))?;

        Ok(settings)
    }
}

/// Get all possible settings file paths in priority order.
pub fn settings_paths() -> Vec<PathBuf> {
    settings_paths_with_env(std::env::var_os("OPSHELL_CONFIG"))
}

fn settings_paths_with_env(env_path: Option<std::ffi::OsString>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(env_path) = env_path {
        paths.push(PathBuf::from(env_path));
    }

    if let Some(proj_dirs) = ProjectDirs::from("", "", "opshell") {
        paths.push(proj_dirs.config_dir().join("settings.toml"));
    }

    if let Some(home) = dirs_home() {
        paths.push(home.join(".config").join("opshell").join("settings.toml"));
    }

    paths.push(PathBuf::from("settings.toml"));

    paths
}

/// Get the user's home directory.
fn dirs_home() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert!(!settings.session.closed_mode);
        assert!(settings.session.user_has_configure_right);
        assert_eq!(settings.windows.default_width, 1200);
        assert_eq!(settings.windows.default_height, 800);
        assert_eq!(settings.behavior.port, opshell_ipc::DEFAULT_PORT);
    }

    #[test]
    fn test_settings_serialization_roundtrip() {
        let settings = Settings::default();
        let toml_str = toml::to_string_pretty(&settings).unwrap();
        let parsed: Settings = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.session.closed_mode, settings.session.closed_mode);
        assert_eq!(parsed.behavior.port, settings.behavior.port);
    }

    #[test]
    fn test_settings_partial_parse() {
        // Settings with only some fields should use defaults for the rest
        let toml_str = r#"
            [session]
            closed_mode = true
        "#;
        let settings: Settings = toml::from_str(toml_str).unwrap();
        assert!(settings.session.closed_mode);
        assert!(settings.session.user_has_configure_right); // default
        assert_eq!(settings.windows.default_width, 1200); // default
    }

    #[test]
    fn test_settings_paths_not_empty() {
        let paths = settings_paths();
        assert!(!paths.is_empty());
    }

    #[test]
    fn test_env_config_path_comes_first() {
        let paths = settings_paths_with_env(Some("/tmp/custom-settings.toml".into()));
        assert_eq!(paths[0], PathBuf::from("/tmp/custom-settings.toml"));

        let without = settings_paths_with_env(None);
        assert_eq!(paths.len(), without.len() + 1);
    }
}
