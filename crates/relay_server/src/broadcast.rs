//! Broadcast dispatcher for registry snapshots.
//!
//! This module pushes the full current registry snapshot to every connected
//! participant whenever the registry changes.

use crate::{connection::ConnectionManager, registry::ParticipantRegistry};
use presence_protocol::ServerEvent;
use std::sync::Arc;
use tracing::{debug, error};

/// Pushes registry snapshots to all connected participants.
///
/// Every registry mutation (update or disconnect) is followed by one call
/// to [`publish`](BroadcastDispatcher::publish). The snapshot is sent to
/// every connection, including the one whose update triggered it — clients
/// skip their own identity at render time rather than relying on
/// server-side exclusion.
///
/// There is no coalescing or rate limiting: one mutation produces one
/// broadcast. The snapshot is taken after the mutation and is immutable,
/// so a broadcast never observes a half-applied change and is never rolled
/// back if delivery to some recipient fails.
#[derive(Debug)]
pub struct BroadcastDispatcher {
    /// The authoritative registry to snapshot
    registry: Arc<ParticipantRegistry>,

    /// Connection manager providing the fan-out path
    connection_manager: Arc<ConnectionManager>,
}

impl BroadcastDispatcher {
    /// Creates a new dispatcher over the given registry and connections.
    pub fn new(
        registry: Arc<ParticipantRegistry>,
        connection_manager: Arc<ConnectionManager>,
    ) -> Self {
        Self {
            registry,
            connection_manager,
        }
    }

    /// Takes a registry snapshot and queues it for every connection.
    ///
    /// Delivery is best-effort per recipient; failures are logged by the
    /// connection manager and do not affect the other recipients or the
    /// registry state that triggered the broadcast.
    ///
    /// # Returns
    ///
    /// The number of connections the snapshot was queued for.
    pub async fn publish(&self) -> usize {
        let snapshot = self.registry.snapshot().await;
        let participant_count = snapshot.len();

        let frame = match serde_json::to_vec(&ServerEvent::Move(snapshot)) {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to serialize registry snapshot: {}", e);
                return 0;
            }
        };

        let recipients = self.connection_manager.broadcast_to_all(frame).await;
        debug!(
            "📡 Published snapshot of {} participant(s) to {} connection(s)",
            participant_count, recipients
        );
        recipients
    }
}
