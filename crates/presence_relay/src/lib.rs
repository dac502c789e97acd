//! # Presence Relay - Main Entry Point
//!
//! Real-time pose synchronization relay for shared 3D spaces. This entry
//! point handles CLI parsing, configuration loading, and application
//! lifecycle management.
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! presence_relay
//!
//! # Specify custom configuration
//! presence_relay --config production.toml
//!
//! # Override specific settings
//! presence_relay --bind 0.0.0.0:8080 --log-level debug
//!
//! # JSON logging for production
//! presence_relay --json-logs
//! ```
//!
//! ## Configuration
//!
//! The relay loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The relay handles graceful shutdown on:
//! - SIGINT (Ctrl+C)
//! - SIGTERM (Unix systems)

use tracing::error;

mod app;
mod cli;
mod config;
mod logging;
mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Main entry point for the presence relay.
///
/// Handles the complete application lifecycle including:
/// 1. Command-line argument parsing
/// 2. Configuration loading and validation
/// 3. Logging system initialization
/// 4. Application creation and execution
/// 5. Error handling and cleanup
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
///
/// Note: This function is called from an async context (main with
/// #[tokio::main]), so it should NOT have #[tokio::main] itself.
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    // Parse CLI arguments first
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let config = AppConfig::load_from_file(&args.config_path)
        .await
        .unwrap_or_default();

    // Setup logging before anything else
    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    // Create and run application
    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{LoggingSettings, ServerSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        // Test conversion to ServerConfig
        let server_config = config
            .to_server_config()
            .expect("Default config should convert to ServerConfig");
        assert_eq!(server_config.max_connections, 64);
        assert_eq!(server_config.connection_timeout, 60);
    }

    #[tokio::test]
    async fn test_config_validation() {
        let mut config = AppConfig::default();

        // Test invalid bind address
        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        // Test invalid log level
        config.server.bind_address = "127.0.0.1:8080".to_string();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cli_parsing() {
        // Test CLI argument structure
        let args = CliArgs {
            config_path: PathBuf::from("test.toml"),
            bind_address: Some("127.0.0.1:9000".to_string()),
            log_level: Some("debug".to_string()),
            json_logs: true,
            max_connections: Some(128),
        };

        assert_eq!(args.config_path, PathBuf::from("test.toml"));
        assert_eq!(args.bind_address, Some("127.0.0.1:9000".to_string()));
        assert_eq!(args.log_level, Some("debug".to_string()));
        assert!(args.json_logs);
        assert_eq!(args.max_connections, Some(128));
    }

    #[tokio::test]
    async fn test_application_creation_with_overrides() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config_path = dir.path().join("test_config.toml");

        // Create a test config file
        let test_config = AppConfig::default();
        let toml_content = toml::to_string_pretty(&test_config)
            .expect("Failed to serialize default config to TOML");
        tokio::fs::write(&config_path, toml_content)
            .await
            .expect("Failed to write test config file");

        let args = CliArgs {
            config_path,
            bind_address: Some("127.0.0.1:0".to_string()),
            log_level: None,
            json_logs: false,
            max_connections: Some(8),
        };

        let app = Application::new(args)
            .await
            .expect("Application should build from a valid config");
        drop(app);
    }
}
