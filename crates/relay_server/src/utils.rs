//! Utility functions and helper methods for the relay server.
//!
//! This module provides convenient factory functions for creating relay
//! instances with different configurations.

use crate::{config::ServerConfig, server::RelayServer};

/// Creates a new relay server with default configuration.
///
/// This is a convenience function for quickly setting up a relay with
/// sensible defaults for development and testing.
///
/// # Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use relay_server::create_relay;
///
/// let relay = create_relay();
/// # }
/// ```
pub fn create_relay() -> RelayServer {
    RelayServer::new(ServerConfig::default())
}

/// Creates a new relay server with custom configuration.
///
/// # Arguments
///
/// * `config` - A `ServerConfig` instance with desired settings
///
/// # Example
///
/// ```rust
/// # #[tokio::main]
/// # async fn main() {
/// use relay_server::{create_relay_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 256,
///     ..Default::default()
/// };
///
/// let relay = create_relay_with_config(config);
/// # }
/// ```
pub fn create_relay_with_config(config: ServerConfig) -> RelayServer {
    RelayServer::new(config)
}
