//! Configuration management for the presence relay.
//!
//! This module handles loading, validation, and conversion of relay
//! configuration from TOML files and command-line arguments.

use relay_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

/// Default for connection_timeout
fn default_connection_timeout() -> u64 {
    60
}

/// Default for max_connections
fn default_max_connections() -> usize {
    64
}

/// Application configuration loaded from TOML file.
///
/// This is the main configuration structure that encompasses all relay
/// settings including networking and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Relay server configuration settings
    pub server: ServerSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits, and timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the relay to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// WebSocket handshake timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
}

/// Logging system configuration.
///
/// Controls log output format, levels, and destination settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
    /// Optional file path for log output (None means stdout only)
    pub file_path: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: 64,
                connection_timeout: 60,
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
                file_path: None,
            },
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation
    /// failed.
    pub async fn load_from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            // Create default config file
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a relay server
    /// configuration.
    ///
    /// This method translates the TOML-based configuration into the types
    /// expected by the relay core.
    ///
    /// # Returns
    ///
    /// A `ServerConfig` instance ready for use with the relay server.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// Checks the network address, connection limits, and logging settings
    /// for validity.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing
    /// the issue.
    pub fn validate(&self) -> Result<(), String> {
        // Validate bind address
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        // Validate connection limit
        if self.server.max_connections == 0 {
            return Err("server.max_connections must be greater than 0".to_string());
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        // Test server settings
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 64);
        assert_eq!(config.server.connection_timeout, 60);

        // Test logging settings
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.logging.json_format, false);
        assert!(config.logging.file_path.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();
        assert!(config.validate().is_ok());

        // Invalid bind address
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        // Zero connection limit
        config.server.bind_address = "127.0.0.1:8080".to_string();
        config.server.max_connections = 0;
        assert!(config.validate().is_err());

        // Invalid log level
        config.server.max_connections = 64;
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_to_server_config() {
        let config = AppConfig::default();
        let server_config = config
            .to_server_config()
            .expect("Default config should convert to ServerConfig");
        assert_eq!(server_config.max_connections, 64);
        assert_eq!(server_config.connection_timeout, 60);
        assert_eq!(
            server_config.bind_address,
            "127.0.0.1:8080".parse().unwrap()
        );
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file_creates_default() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path)
            .await
            .expect("Loading a missing config should fall back to default");
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");

        // A default file was written for next time
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");

        let toml_content = r#"
[server]
bind_address = "0.0.0.0:9000"
max_connections = 256

[logging]
level = "debug"
json_format = true
"#;
        tokio::fs::write(&path, toml_content)
            .await
            .expect("write test config");

        let config = AppConfig::load_from_file(&path)
            .await
            .expect("Loading a valid config file should succeed");
        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.server.max_connections, 256);
        // Defaulted field
        assert_eq!(config.server.connection_timeout, 60);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_load_rejects_malformed_toml() {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("config.toml");

        tokio::fs::write(&path, "this is not toml {{{")
            .await
            .expect("write test config");

        assert!(AppConfig::load_from_file(&path).await.is_err());
    }
}
