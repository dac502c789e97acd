//! Message routing logic for dispatching client frames.
//!
//! This module parses incoming client frames, binds them to the sending
//! connection's identity, applies them to the registry, and triggers the
//! broadcast that follows every registry mutation.

use crate::{
    broadcast::BroadcastDispatcher, connection::ConnectionId, connection::ConnectionManager,
    error::ServerError, registry::ParticipantRegistry,
};
use presence_protocol::ClientEvent;
use tracing::trace;

/// Routes a raw client frame against the registry.
///
/// Parses the incoming text as a [`ClientEvent`], validates that the
/// asserted identity matches the one assigned to the sending connection,
/// applies the pose to the registry, and publishes the resulting snapshot
/// to all connections.
///
/// The protocol is fire-and-forget: no acknowledgement is returned to the
/// sender beyond the broadcast itself.
///
/// # Arguments
///
/// * `text` - The raw frame text from the client (expected to be JSON)
/// * `connection_id` - The unique identifier for the client connection
/// * `connection_manager` - Manager for looking up the sender's identity
/// * `registry` - The authoritative participant registry
/// * `dispatcher` - Dispatcher publishing snapshots after mutations
///
/// # Returns
///
/// `Ok(())` if the frame was applied and broadcast, or a `ServerError` if
/// the frame was malformed or asserted a foreign identity. Callers log the
/// error and keep the connection alive — a bad frame is dropped, it never
/// tears down the handler.
///
/// # Example Frame
///
/// ```json
/// {
///   "event": "move",
///   "data": {
///     "id": "550e8400-e29b-41d4-a716-446655440000",
///     "position": [1.0, 0.0, 0.0],
///     "rotation": [0.0, 0.0, 0.0]
///   }
/// }
/// ```
pub async fn route_client_message(
    text: &str,
    connection_id: ConnectionId,
    connection_manager: &ConnectionManager,
    registry: &ParticipantRegistry,
    dispatcher: &BroadcastDispatcher,
) -> Result<(), ServerError> {
    // Fail closed on malformed payloads: drop the frame, never the handler
    let event: ClientEvent = serde_json::from_str(text)
        .map_err(|e| ServerError::Network(format!("Invalid JSON: {e}")))?;

    let participant_id = connection_manager
        .get_participant_id(connection_id)
        .await
        .ok_or_else(|| ServerError::Internal("Participant not found".to_string()))?;

    match event {
        ClientEvent::Move(update) => {
            // Each frame is bound to its own connection's identity; a client
            // cannot write another participant's registry entry
            if update.id != participant_id {
                return Err(ServerError::Network(format!(
                    "Identity mismatch: connection {} owns {} but asserted {}",
                    connection_id, participant_id, update.id
                )));
            }

            registry.upsert(update.id, update.pose()).await;
            dispatcher.publish().await;

            trace!(
                "✅ Applied move from participant {} via connection {}",
                participant_id,
                connection_id
            );
        }
    }

    Ok(())
}
