//! Client connection representation.
//!
//! This module defines the structure of an individual client connection,
//! tracking its identity and metadata.

use presence_protocol::ParticipantId;
use std::net::SocketAddr;
use std::time::SystemTime;

/// Represents an individual client connection to the relay.
///
/// Tracks the essential information about a connected client: the
/// participant identity assigned at accept time, the remote network
/// address, and when the connection was established.
#[derive(Debug)]
pub struct ClientConnection {
    /// The participant identity assigned to this connection
    /// (None until assignment completes during connection setup)
    pub participant_id: Option<ParticipantId>,

    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,
}

impl ClientConnection {
    /// Creates a new client connection with the specified remote address.
    ///
    /// The connection starts without a participant identity assigned and
    /// records the current time as the connection timestamp.
    pub fn new(remote_addr: SocketAddr) -> Self {
        Self {
            participant_id: None,
            remote_addr,
            connected_at: SystemTime::now(),
        }
    }
}
