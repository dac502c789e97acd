//! Relay server orchestration.
//!
//! Contains the main server struct, its accept loop, and per-connection
//! handling logic.

pub mod core;
pub mod handlers;

pub use core::RelayServer;
