use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/node.json";
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 9001;

/// A chat to join through a known peer as soon as the node is up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapChat {
    pub address: String,
    pub port: u16,
    pub chat: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub bootstrap: Vec<BootstrapChat>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            port: default_port(),
            name: default_name(),
            bootstrap: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Command-line values win over the file.
    pub fn with_overrides(
        mut self,
        address: Option<String>,
        port: Option<u16>,
        name: Option<String>,
    ) -> Self {
        if let Some(address) = address {
            self.address = address;
        }
        if let Some(port) = port {
            self.port = port;
        }
        if let Some(name) = name {
            self.name = name;
        }
        self
    }
}

fn default_address() -> String {
    DEFAULT_ADDRESS.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_name() -> String {
    std::env::var("USER")
        .ok()
        .filter(|user| !user.trim().is_empty())
        .unwrap_or_else(|| "anonymous".to_string())
}

pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => parse_config(&content).unwrap_or_else(|err| {
            log::warn!("Failed to parse config file {}: {err}", path.display());
            AppConfig::default()
        }),
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}

fn parse_config(content: &str) -> serde_json::Result<AppConfig> {
    serde_json::from_str::<AppConfig>(content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let config = parse_config(r#"{ "port": 9100, "name": "alice" }"#).unwrap();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.port, 9100);
        assert_eq!(config.name, "alice");
        assert!(config.bootstrap.is_empty());
    }

    #[test]
    fn test_bootstrap_entries() {
        let config = parse_config(
            r#"{ "bootstrap": [ { "address": "10.0.0.1", "port": 9001, "chat": "room" } ] }"#,
        )
        .unwrap();
        assert_eq!(
            config.bootstrap,
            vec![BootstrapChat {
                address: "10.0.0.1".into(),
                port: 9001,
                chat: "room".into(),
            }]
        );
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = load_config("does/not/exist.json");
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_overrides_win() {
        let config = AppConfig::default().with_overrides(None, Some(7000), Some("zed".into()));
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.port, 7000);
        assert_eq!(config.name, "zed");
    }
}
