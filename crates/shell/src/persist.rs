//! Persistence of the layout documents and the endpoint address.
//!
//! The default and user configuration documents are stored as pretty-printed
//! JSON under the platform data directory. The endpoint address is a single
//! plain-text file next to them.

use anyhow::Result;
use opshell_core_config::MultiMonitorConfiguration;
use std::path::PathBuf;
use tracing::{info, warn};

const DEFAULT_CONFIGURATION_FILE: &str = "default-configuration.json";
const USER_CONFIGURATION_FILE: &str = "user-configuration.json";
const ENDPOINT_FILE: &str = "endpoint.txt";

/// Stores and retrieves the layout documents and the endpoint address.
pub struct ConfigurationFiles {
    data_dir: PathBuf,
}

impl ConfigurationFiles {
    pub fn new() -> Self {
        let data_dir = directories::ProjectDirs::from("", "", "opshell")
            .map(|dirs| dirs.data_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));
        Self { data_dir }
    }

    /// Use an explicit directory instead of the platform data dir.
    pub fn with_dir(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn load_default_configuration(&self) -> Option<MultiMonitorConfiguration> {
        self.load_document(DEFAULT_CONFIGURATION_FILE)
    }

    pub fn load_user_configuration(&self) -> Option<MultiMonitorConfiguration> {
        self.load_document(USER_CONFIGURATION_FILE)
    }

    pub fn save_default_configuration(&self, config: &MultiMonitorConfiguration) -> Result<()> {
        self.save_document(DEFAULT_CONFIGURATION_FILE, config)
    }

    pub fn save_user_configuration(&self, config: &MultiMonitorConfiguration) -> Result<()> {
        self.save_document(USER_CONFIGURATION_FILE, config)
    }

    /// Read the stored endpoint address, if any.
    pub fn read_endpoint(&self) -> Option<String> {
        let path = self.data_dir.join(ENDPOINT_FILE);
        match std::fs::read_to_string(&path) {
            Ok(addr) => {
                let addr = addr.trim().to_string();
                if addr.is_empty() {
                    None
                } else {
                    Some(addr)
                }
            }
            Err(_) => None,
        }
    }

    pub fn save_endpoint(&self, address: &str) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(ENDPOINT_FILE);
        std::fs::write(&path, address)?;
        info!("Endpoint address saved to {:?}", path);
        Ok(())
    }

    fn load_document(&self, file_name: &str) -> Option<MultiMonitorConfiguration> {
        let path = self.data_dir.join(file_name);
        match std::fs::read_to_string(&path) {
            Ok(json) => match serde_json::from_str(&json) {
                Ok(config) => Some(config),
                Err(e) => {
                    warn!("Failed to parse {}: {}", file_name, e);
                    None
                }
            },
            Err(_) => None,
        }
    }

    fn save_document(&self, file_name: &str, config: &MultiMonitorConfiguration) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        let path = self.data_dir.join(file_name);
        let json = serde_json::to_string_pretty(config)?;
        std::fs::write(&path, json)?;
        info!("Configuration saved to {:?}", path);
        Ok(())
    }
}

impl Default for ConfigurationFiles {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opshell_core_config::{
        frame_template, ManagerDefinition, ManagerType, ManagerWindow, MultiMonitorConfiguration,
    };

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("opshell-persist-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_missing_documents_load_as_none() {
        let files = ConfigurationFiles::with_dir(temp_dir("missing"));
        assert!(files.load_default_configuration().is_none());
        assert!(files.load_user_configuration().is_none());
        assert!(files.read_endpoint().is_none());
    }

    #[test]
    fn test_configuration_roundtrip() {
        let dir = temp_dir("roundtrip");
        let files = ConfigurationFiles::with_dir(dir.clone());

        let mut config = MultiMonitorConfiguration::empty();
        config.windows.push(ManagerWindow {
            id: "w1".to_string(),
            x: 100,
            y: 100,
            width: 1200,
            height: 800,
            maximized: false,
            display_id: 0,
            display_x: 0,
            display_y: 0,
            display_width: 1920,
            display_height: 1080,
            scale_factor: 1.0,
            manager: ManagerDefinition {
                manager_type: ManagerType::Main,
                frames: Some(frame_template(ManagerType::Main)),
                startup_node: None,
            },
        });
        files.save_default_configuration(&config).unwrap();

        let loaded = files.load_default_configuration().unwrap();
        assert_eq!(loaded.windows.len(), 1);
        assert_eq!(loaded.windows[0].id, "w1");

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_endpoint_roundtrip() {
        let dir = temp_dir("endpoint");
        let files = ConfigurationFiles::with_dir(dir.clone());
        files.save_endpoint("https://host.example/app").unwrap();
        assert_eq!(files.read_endpoint().as_deref(), Some("https://host.example/app"));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
