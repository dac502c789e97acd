//! Connection handling logic for WebSocket clients.
//!
//! This module contains the core connection handling logic that manages
//! the lifecycle of individual client connections, including WebSocket
//! handshaking, identity assignment, frame processing, and cleanup.

use crate::{
    broadcast::BroadcastDispatcher,
    connection::ConnectionManager,
    error::ServerError,
    messaging::route_client_message,
    registry::ParticipantRegistry,
};
use futures::{SinkExt, StreamExt};
use presence_protocol::{ParticipantId, ServerEvent};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

/// Handles a single client connection from establishment to cleanup.
///
/// # Connection Flow
///
/// 1. Perform WebSocket handshake (bounded by `handshake_timeout`; a
///    connection that never completes the handshake is dropped)
/// 2. Register the connection and assign a participant identity
/// 3. Announce the identity to the client with a `session` event
/// 4. Run the incoming and outgoing frame tasks concurrently
/// 5. On either task ending: remove the registry entry, drop the
///    connection, and publish a snapshot so peers stop seeing a ghost
///
/// The disconnect path runs exactly once per connection, and both the
/// registry removal and connection removal are no-ops when already absent,
/// so duplicate close events are idempotent.
///
/// # Arguments
///
/// * `stream` - The TCP stream for the client connection
/// * `addr` - The remote address of the client
/// * `handshake_timeout` - Maximum time allowed for the WebSocket handshake
/// * `connection_manager` - Manager for tracking connections
/// * `registry` - The authoritative participant registry
/// * `dispatcher` - Dispatcher publishing snapshots after mutations
///
/// # Returns
///
/// `Ok(())` if the connection was handled through to cleanup, or a
/// `ServerError` if the WebSocket handshake failed.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handshake_timeout: Duration,
    connection_manager: Arc<ConnectionManager>,
    registry: Arc<ParticipantRegistry>,
    dispatcher: Arc<BroadcastDispatcher>,
) -> Result<(), ServerError> {
    // Perform WebSocket handshake, dropping clients that never complete it
    let ws_stream = timeout(handshake_timeout, accept_async(stream))
        .await
        .map_err(|_| ServerError::Network(format!("WebSocket handshake timed out for {addr}")))?
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed: {e}")))?;

    let (ws_sender, mut ws_receiver) = ws_stream.split();
    let ws_sender = Arc::new(tokio::sync::Mutex::new(ws_sender));

    // Subscribe before registering: a snapshot queued the instant the
    // connection starts counting as a recipient is already observable
    let mut frame_receiver = connection_manager.subscribe();
    let connection_id = connection_manager.add_connection(addr).await;

    // Assign the transport-level identity and tell the client about it.
    // This replaces the session id the original transport exchanged during
    // its own handshake; the client sends nothing in return.
    let participant_id = ParticipantId::new();
    connection_manager
        .set_participant_id(connection_id, participant_id)
        .await;

    let session_frame = serde_json::to_string(&ServerEvent::Session { id: participant_id })
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    {
        let mut sender = ws_sender.lock().await;
        if let Err(e) = sender.send(Message::Text(session_frame.into())).await {
            warn!(
                "Failed to announce session to connection {}: {}",
                connection_id, e
            );
        }
    }

    info!(
        "👋 Participant {} joined via connection {}",
        participant_id, connection_id
    );

    let ws_sender_incoming = ws_sender.clone();
    let ws_sender_outgoing = ws_sender.clone();

    // Incoming frame task - applies pose updates to the registry
    let incoming_task = {
        let connection_manager = connection_manager.clone();
        let registry = registry.clone();
        let dispatcher = dispatcher.clone();

        async move {
            while let Some(msg) = ws_receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        // A bad frame is dropped; the connection survives
                        if let Err(e) = route_client_message(
                            &text,
                            connection_id,
                            &connection_manager,
                            &registry,
                            &dispatcher,
                        )
                        .await
                        {
                            warn!("❌ Dropped frame from connection {}: {}", connection_id, e);
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Client {} requested close", connection_id);
                        break;
                    }
                    Ok(Message::Ping(data)) => {
                        let mut ws_sender = ws_sender_incoming.lock().await;
                        let _ = ws_sender.send(Message::Pong(data)).await;
                    }
                    Err(e) => {
                        error!("WebSocket error for connection {}: {}", connection_id, e);
                        break;
                    }
                    _ => {}
                }
            }
        }
    };

    // Outgoing frame task - delivers snapshots targeted at this connection
    let outgoing_task = {
        let ws_sender = ws_sender_outgoing;
        async move {
            while let Ok((target_connection_id, frame)) = frame_receiver.recv().await {
                if target_connection_id == connection_id {
                    let frame_text = String::from_utf8_lossy(&frame);
                    let mut ws_sender = ws_sender.lock().await;
                    if let Err(e) = ws_sender
                        .send(Message::Text(frame_text.to_string().into()))
                        .await
                    {
                        error!("Failed to send frame: {}", e);
                        break;
                    }
                }
            }
        }
    };

    // Run both tasks concurrently until one completes
    tokio::select! {
        _ = incoming_task => {},
        _ = outgoing_task => {},
    }

    // Disconnect cleanup: one remove, one broadcast. The registry remove is
    // a no-op if this participant never reported a pose.
    registry.remove(participant_id).await;
    connection_manager.remove_connection(connection_id).await;
    dispatcher.publish().await;

    info!(
        "👋 Participant {} left via connection {}",
        participant_id, connection_id
    );
    Ok(())
}
