//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central management system for all client
//! connections, handling connection lifecycle, participant identity
//! assignment, and frame broadcasting.

use super::{client::ClientConnection, ConnectionId};
use presence_protocol::ParticipantId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::info;

/// Central manager for all client connections.
///
/// The `ConnectionManager` tracks active connections, assigns unique IDs,
/// manages participant associations, and provides frame broadcasting.
/// It uses async-safe data structures to handle concurrent access from
/// multiple connection handlers.
///
/// # Architecture
///
/// * Uses `RwLock<HashMap>` for thread-safe connection storage
/// * Implements atomic connection ID generation
/// * Provides a broadcast channel for outgoing frames; each connection's
///   outgoing task subscribes and filters on its own connection ID
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: Arc<RwLock<HashMap<ConnectionId, ClientConnection>>>,

    /// Atomic counter for generating unique connection IDs
    next_id: Arc<std::sync::atomic::AtomicUsize>,

    /// Broadcast sender for outgoing frames to specific connections
    sender: broadcast::Sender<(ConnectionId, Vec<u8>)>,
}

impl ConnectionManager {
    /// Creates a new connection manager.
    ///
    /// Initializes the internal data structures and broadcast channel
    /// with a reasonable buffer size for frame queuing.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1000);
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(std::sync::atomic::AtomicUsize::new(1)),
            sender,
        }
    }

    /// Adds a new connection and returns its unique ID.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    ///
    /// # Returns
    ///
    /// A unique `ConnectionId` assigned to this connection.
    pub async fn add_connection(&self, remote_addr: SocketAddr) -> ConnectionId {
        let connection_id = self
            .next_id
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let connection = ClientConnection::new(remote_addr);
        let mut connections = self.connections.write().await;
        connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        connection_id
    }

    /// Removes a connection from the manager.
    ///
    /// Cleans up the connection entry and logs the disconnection. This is
    /// called when a client disconnects or times out; removing an already
    /// absent connection is a no-op, so duplicate close events are safe.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - The ID of the connection to remove
    pub async fn remove_connection(&self, connection_id: ConnectionId) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.remove(&connection_id) {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
    }

    /// Associates a participant identity with a connection.
    ///
    /// Called during connection setup, once the relay has assigned an
    /// identity to the new connection.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - The connection to update
    /// * `participant_id` - The identity to assign
    pub async fn set_participant_id(
        &self,
        connection_id: ConnectionId,
        participant_id: ParticipantId,
    ) {
        let mut connections = self.connections.write().await;
        if let Some(connection) = connections.get_mut(&connection_id) {
            connection.participant_id = Some(participant_id);
        }
    }

    /// Retrieves the participant identity associated with a connection.
    ///
    /// # Returns
    ///
    /// The associated `ParticipantId` if found, or `None` if the connection
    /// doesn't exist or doesn't have an identity assigned yet.
    pub async fn get_participant_id(&self, connection_id: ConnectionId) -> Option<ParticipantId> {
        let connections = self.connections.read().await;
        connections
            .get(&connection_id)
            .and_then(|c| c.participant_id)
    }

    /// Number of currently tracked connections.
    pub async fn connection_count(&self) -> usize {
        let connections = self.connections.read().await;
        connections.len()
    }

    /// Sends a frame to a specific connection.
    ///
    /// Queues a frame for delivery to the specified connection through
    /// the internal broadcast channel.
    ///
    /// # Arguments
    ///
    /// * `connection_id` - The target connection
    /// * `frame` - The frame data to send
    pub async fn send_to_connection(&self, connection_id: ConnectionId, frame: Vec<u8>) {
        if let Err(e) = self.sender.send((connection_id, frame)) {
            tracing::error!(
                "Failed to send frame to connection {}: {:?}",
                connection_id,
                e
            );
        }
    }

    /// Broadcasts a frame to all currently connected clients.
    ///
    /// Delivery is best-effort per recipient: a failure to queue for one
    /// connection is logged and does not block or fail delivery to the
    /// others.
    ///
    /// # Arguments
    ///
    /// * `frame` - The frame data to broadcast to all clients
    ///
    /// # Returns
    ///
    /// The number of connections that the frame was queued for.
    pub async fn broadcast_to_all(&self, frame: Vec<u8>) -> usize {
        let connections = self.connections.read().await;
        let connection_count = connections.len();

        for &connection_id in connections.keys() {
            if let Err(e) = self.sender.send((connection_id, frame.clone())) {
                tracing::error!(
                    "Failed to broadcast frame to connection {}: {:?}",
                    connection_id,
                    e
                );
            }
        }

        tracing::debug!("📡 Broadcasted frame to {} connections", connection_count);
        connection_count
    }

    /// Creates a new receiver for outgoing frames.
    ///
    /// Each connection handler calls this to get a receiver for frames
    /// targeted at its specific connection.
    pub fn subscribe(&self) -> broadcast::Receiver<(ConnectionId, Vec<u8>)> {
        self.sender.subscribe()
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}
