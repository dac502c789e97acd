//! # Relay Server - Pose Synchronization Core
//!
//! The server side of a real-time multiplayer presence layer. Each
//! connected participant streams pose updates over WebSocket; the relay
//! merges them into an authoritative registry and rebroadcasts the full
//! registry snapshot to every connection on every change, so every client
//! can render everyone else's avatar in a shared 3D space.
//!
//! ## Core Components
//!
//! * **Participant Registry** - authoritative identity-to-pose map with
//!   last-writer-wins merge semantics
//! * **Connection Manager** - WebSocket connection lifecycle and frame
//!   fan-out
//! * **Message Router** - parses inbound frames, binds them to the sending
//!   connection's identity, and applies them to the registry
//! * **Broadcast Dispatcher** - publishes a snapshot after every registry
//!   mutation
//!
//! ## Message Flow
//!
//! 1. Client connects; the relay assigns a [`presence_protocol::ParticipantId`]
//!    and announces it with a `session` event
//! 2. Client sends `move` frames with its latest pose
//! 3. The relay validates the asserted identity, upserts the registry, and
//!    broadcasts the new snapshot to every connection (sender included)
//! 4. On disconnect the entry is removed exactly once and a final snapshot
//!    is broadcast so peers stop rendering the ghost
//!
//! ## What the relay does NOT do
//!
//! No pose validation or anti-cheat, no persistence, no interest
//! management, no delta encoding, no heartbeat of its own — disconnect
//! detection relies entirely on the transport's liveness signaling.
//!
//! ## Thread Safety
//!
//! Connection state and the registry use `Arc<RwLock<HashMap>>`; `upsert`,
//! `remove`, and `snapshot` are each atomic, and snapshots are owned copies
//! that a concurrent update can never mutate mid-broadcast.

// Re-export core types and functions for easy access
pub use broadcast::BroadcastDispatcher;
pub use config::ServerConfig;
pub use error::ServerError;
pub use registry::ParticipantRegistry;
pub use server::RelayServer;
pub use utils::{create_relay, create_relay_with_config};

// Public module declarations
pub mod broadcast;
pub mod config;
pub mod error;
pub mod registry;
pub mod server;
pub mod utils;

pub mod connection;
pub mod messaging;
