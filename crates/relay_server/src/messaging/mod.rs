//! Message handling for client-to-relay communication.
//!
//! This module handles the parsing and dispatch of incoming client frames
//! against the participant registry.

pub mod router;

pub use router::route_client_message;
