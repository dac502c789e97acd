//! Main application logic and lifecycle management.
//!
//! This module contains the core `Application` struct that orchestrates
//! relay startup, the signal wait, and graceful shutdown.

use crate::{cli::CliArgs, config::AppConfig, logging::display_banner, signals::{setup_signal_handlers, setup_signal_handlers_silent}};
use relay_server::RelayServer;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Main application struct for the relay binary.
///
/// The `Application` struct manages the complete lifecycle of the relay,
/// including configuration loading, server initialization, and graceful
/// shutdown handling.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Relay server instance
    relay: Arc<RelayServer>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// Loads configuration, applies CLI overrides, validates settings, and
    /// initializes the relay server.
    ///
    /// # Arguments
    ///
    /// * `args` - Parsed command-line arguments
    ///
    /// # Returns
    ///
    /// A configured `Application` instance ready to run, or an error if
    /// initialization failed.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize relay server with configuration
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let mut config = AppConfig::load_from_file(&args.config_path).await?;

        // Apply CLI overrides
        if let Some(bind_address) = args.bind_address {
            config.server.bind_address = bind_address;
        }

        if let Some(log_level) = args.log_level {
            config.logging.level = log_level;
        }

        if args.json_logs {
            config.logging.json_format = true;
        }

        if let Some(max_connections) = args.max_connections {
            config.server.max_connections = max_connections;
        }

        // Validate configuration
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration loaded and validated successfully");

        // Display banner after logging is setup
        display_banner();

        let server_config = config.to_server_config()?;
        let relay = Arc::new(RelayServer::new(server_config));

        info!(
            "📂 Config: {} | Bind: {}",
            args.config_path.display(),
            config.server.bind_address
        );

        Ok(Self { config, relay })
    }

    /// Runs the application until a shutdown signal arrives.
    ///
    /// Binds and starts the relay in a background task, waits for a
    /// termination signal, then shuts the relay down gracefully. A second
    /// signal during shutdown forces an immediate exit.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the application ran and shut down successfully, or an
    /// error if there was a critical failure during execution.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting Presence Relay");
        self.log_configuration_summary();

        // Bind up front so a bad address fails before we daemonize the loop
        let local_addr = self.relay.bind().await?;

        let relay = self.relay.clone();
        let server_handle = tokio::spawn(async move {
            match relay.start().await {
                Ok(()) => {
                    info!("✅ Relay completed successfully");
                }
                Err(e) => {
                    error!("❌ Relay error: {:?}", e);
                    std::process::exit(1);
                }
            }
        });

        info!("✅ Presence Relay is now running!");
        info!("🎮 Ready to accept connections on {}", local_addr);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        // Wait for shutdown signal
        setup_signal_handlers().await?;

        // merciless shutdown
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up merciless shutdown signal handler: {e}");
                return;
            }

            warn!("Shutdown handler received again! I'll make this quick.");
            std::process::exit(1);
        });

        info!("🛑 Shutdown signal received, beginning graceful shutdown...");
        self.relay.shutdown().await?;

        info!("⏳ Waiting for relay task to complete gracefully...");
        if let Err(e) = tokio::time::timeout(
            tokio::time::Duration::from_secs(8),
            server_handle,
        ).await {
            warn!("⏰ Relay task did not complete within timeout, proceeding with cleanup: {:?}", e);
        } else {
            info!("✅ Relay task completed gracefully");
        }

        // Display final statistics
        info!("📊 Final Statistics:");
        info!(
            "  - Participants still registered: {}",
            self.relay.registry().len().await
        );
        info!(
            "  - Connections still open: {}",
            self.relay.connection_manager().connection_count().await
        );

        info!("✅ Presence Relay shutdown complete");
        info!("👋 Goodbye!");

        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!(
            "  👥 Max connections: {}",
            self.config.server.max_connections
        );
        info!(
            "  ⏱️ Connection timeout: {}s",
            self.config.server.connection_timeout
        );
    }
}
