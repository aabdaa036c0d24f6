//! Configuration management

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use wsrelay_broadcaster::FanoutStrategy;

/// Relay daemon configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// Address the HTTP listener binds to
    pub bind_address: String,

    /// Route performing the WebSocket upgrade
    pub ws_path: String,

    /// Route serving the browser chat page
    pub page_path: String,

    /// Fan-out strategy: "concurrent" or "sequential"
    pub fanout: FanoutStrategy,

    /// WebSocket read buffer size (bytes)
    pub read_buffer_size: usize,

    /// WebSocket write buffer size (bytes)
    pub write_buffer_size: usize,

    /// Largest inbound message accepted (bytes)
    pub max_message_size: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            bind_address: "0.0.0.0:3000".to_string(),
            ws_path: "/ws".to_string(),
            page_path: "/html".to_string(),
            fanout: FanoutStrategy::Concurrent,
            read_buffer_size: 1024,
            write_buffer_size: 1024,
            max_message_size: 64 * 1024,
        }
    }
}

impl RelayConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(Self::default_config_path())
    }

    /// Load configuration from `path`, writing defaults there if it is missing
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let config_path = path.as_ref().to_path_buf();

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

            let mut config: RelayConfig = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

            config.config_path = config_path;
            Ok(config)
        } else {
            let config = Self {
                config_path,
                ..Self::default()
            };
            config.save()
                .context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        // Ensure config directory exists
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Check values that would otherwise only fail once the server starts
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;

        ensure!(self.ws_path.starts_with('/'), "ws_path must start with '/': {}", self.ws_path);
        ensure!(
            self.page_path.starts_with('/'),
            "page_path must start with '/': {}",
            self.page_path
        );
        ensure!(
            self.ws_path != self.page_path,
            "ws_path and page_path must differ (both are {})",
            self.ws_path
        );
        ensure!(self.read_buffer_size > 0, "read_buffer_size must be non-zero");
        ensure!(self.write_buffer_size > 0, "write_buffer_size must be non-zero");
        ensure!(self.max_message_size > 0, "max_message_size must be non-zero");

        Ok(())
    }

    /// Parsed form of `bind_address`
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.bind_address
            .parse()
            .with_context(|| format!("Invalid bind_address: {}", self.bind_address))
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("wsrelay")
            .join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_are_valid() {
        let config = RelayConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:3000");
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.page_path, "/html");
        assert_eq!(config.fanout, FanoutStrategy::Concurrent);
        config.validate().unwrap();
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let config = RelayConfig::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.config_path, path);
        assert_eq!(config.read_buffer_size, 1024);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = RelayConfig::load_from(&path).unwrap();
        config.bind_address = "127.0.0.1:4000".to_string();
        config.fanout = FanoutStrategy::Sequential;
        config.save().unwrap();

        let reloaded = RelayConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.bind_address, "127.0.0.1:4000");
        assert_eq!(reloaded.fanout, FanoutStrategy::Sequential);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "fanout = \"sequential\"\nws_path = \"/chat\"\n").unwrap();

        let config = RelayConfig::load_from(&path).unwrap();
        assert_eq!(config.fanout, FanoutStrategy::Sequential);
        assert_eq!(config.ws_path, "/chat");
        assert_eq!(config.page_path, "/html");
        assert_eq!(config.max_message_size, 64 * 1024);
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "fanout = \"broadcast-storm\"\n").unwrap();

        assert!(RelayConfig::load_from(&path).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = RelayConfig::default();
        config.bind_address = "not an address".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.ws_path = "ws".to_string();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.page_path = config.ws_path.clone();
        assert!(config.validate().is_err());

        let mut config = RelayConfig::default();
        config.read_buffer_size = 0;
        assert!(config.validate().is_err());
    }
}
