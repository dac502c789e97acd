//! Relay configuration types and defaults.
//!
//! This module contains the relay configuration structure and default values
//! used to initialize and customize relay behavior.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

/// Configuration structure for the relay server.
///
/// Contains all necessary parameters to configure relay behavior including
/// network settings and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the relay to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// WebSocket handshake timeout in seconds; a connection that never
    /// completes the handshake is dropped after this long
    pub connection_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().expect("Invalid default bind address"),
            max_connections: 64,
            connection_timeout: 60,
        }
    }
}
