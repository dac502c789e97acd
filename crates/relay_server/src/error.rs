//! Error types and handling for the relay server.
//!
//! This module defines the error types that can occur during relay
//! operations, providing clear categorization of different failure modes.

/// Enumeration of possible relay errors.
///
/// Categorizes errors into network-related and internal relay errors
/// to help with debugging and error handling. The registry and dispatcher
/// themselves have no fatal error class; individual connection failures
/// never have process-wide impact.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Network-related errors such as binding failures, handshake errors,
    /// or malformed client frames
    #[error("Network error: {0}")]
    Network(String),

    /// Internal relay errors such as missing connection state
    #[error("Internal error: {0}")]
    Internal(String),
}
