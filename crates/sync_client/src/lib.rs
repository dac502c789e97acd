//! # Sync Client - Client Sync Adapter
//!
//! The client half of the presence layer. The adapter has two jobs:
//!
//! * **Outbound**: whenever the local participant's pose changes (driven by
//!   whatever input or control layer the application uses), serialize a
//!   `move` frame with the relay-assigned identity and push it over the
//!   transport.
//! * **Inbound**: on every registry snapshot from the relay, replace the
//!   local mirror wholesale so the renderer's next frame reflects exactly
//!   the relay's last known state.
//!
//! The local participant's own entry is echoed back in every snapshot; the
//! renderer is expected to drive the local avatar from local input and call
//! [`SyncClient::others`] for everyone else.
//!
//! ## State machine
//!
//! `Disconnected → Connecting → Connected → Disconnected`. While
//! `Connecting` (or after the transport closes) outbound sends are dropped
//! quietly — never an error, never a panic. Rendering-side consumers hold a
//! [`PoseListener`] subscription that is released exactly once when it is
//! dropped, on every exit path.

use futures::{SinkExt, StreamExt};
use presence_protocol::{ClientEvent, ParticipantId, PoseUpdate, RegistrySnapshot, ServerEvent};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::{watch, Mutex, RwLock};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

type WsSink = futures::stream::SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;

/// Errors surfaced by the sync adapter.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Transport-level failures: dialing, handshaking, or sending
    #[error("Transport error: {0}")]
    Transport(String),

    /// The relay spoke something the adapter could not interpret
    #[error("Protocol error: {0}")]
    Protocol(String),
}

/// Connection state of the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// No transport; outbound sends are dropped
    Disconnected,
    /// Dialing and waiting for the relay's `session` announcement;
    /// outbound sends are dropped
    Connecting,
    /// Both halves active
    Connected,
}

/// Shared inbound state: the snapshot mirror and its change channel.
#[derive(Debug)]
struct World {
    /// Read-only, eventually-consistent copy of the relay's registry
    mirror: RwLock<RegistrySnapshot>,

    /// Change notifications for pose listeners
    snapshot_tx: watch::Sender<RegistrySnapshot>,
}

impl World {
    fn new() -> Self {
        let (snapshot_tx, _) = watch::channel(RegistrySnapshot::new());
        Self {
            mirror: RwLock::new(RegistrySnapshot::new()),
            snapshot_tx,
        }
    }

    /// Replaces the mirror wholesale. There is no incremental merge: the
    /// relay's snapshot is the whole truth.
    async fn replace(&self, snapshot: RegistrySnapshot) {
        let mut mirror = self.mirror.write().await;
        *mirror = snapshot.clone();
        drop(mirror);
        self.snapshot_tx.send_replace(snapshot);
    }
}

/// A scoped subscription to snapshot changes.
///
/// Wraps a watch receiver; the subscription is released exactly once, when
/// the listener is dropped — on every exit path, including early teardown.
/// No callbacks can dangle after that.
#[derive(Debug)]
pub struct PoseListener {
    receiver: watch::Receiver<RegistrySnapshot>,
    listeners: Arc<AtomicUsize>,
}

impl PoseListener {
    /// Waits for the next snapshot change.
    ///
    /// Returns an error once the owning [`SyncClient`] has been dropped.
    pub async fn changed(&mut self) -> Result<(), watch::error::RecvError> {
        self.receiver.changed().await
    }

    /// The most recently received snapshot.
    pub fn latest(&self) -> RegistrySnapshot {
        self.receiver.borrow().clone()
    }
}

impl Drop for PoseListener {
    fn drop(&mut self) {
        self.listeners.fetch_sub(1, Ordering::Relaxed);
        debug!("🔇 Pose listener released");
    }
}

/// Client-side adapter connecting local pose changes to the relay and the
/// relay's snapshots to local rendering state.
#[derive(Debug)]
pub struct SyncClient {
    /// Current connection state
    state: Arc<RwLock<SyncState>>,

    /// Identity assigned by the relay (None until the session announcement)
    local_id: Arc<RwLock<Option<ParticipantId>>>,

    /// Outbound half of the socket (None while disconnected)
    sink: Arc<Mutex<Option<WsSink>>>,

    /// Inbound mirror shared with the reader task
    world: Arc<World>,

    /// Number of live pose listeners
    listeners: Arc<AtomicUsize>,
}

impl SyncClient {
    /// Creates a new adapter in the `Disconnected` state.
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(SyncState::Disconnected)),
            local_id: Arc::new(RwLock::new(None)),
            sink: Arc::new(Mutex::new(None)),
            world: Arc::new(World::new()),
            listeners: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Connects to the relay and waits for the identity announcement.
    ///
    /// Transitions `Disconnected → Connecting` when dialing starts and
    /// `Connecting → Connected` once the relay's `session` event has
    /// delivered the local identity. Snapshots that arrive before the
    /// announcement are applied to the mirror rather than discarded.
    ///
    /// # Arguments
    ///
    /// * `url` - WebSocket URL of the relay (e.g. `ws://127.0.0.1:8080`)
    pub async fn connect(&self, url: &str) -> Result<(), SyncError> {
        {
            let mut state = self.state.write().await;
            if *state != SyncState::Disconnected {
                return Err(SyncError::Transport("Already connected".to_string()));
            }
            *state = SyncState::Connecting;
        }

        let (socket, _) = match connect_async(url).await {
            Ok(pair) => pair,
            Err(e) => {
                *self.state.write().await = SyncState::Disconnected;
                return Err(SyncError::Transport(format!("Failed to connect: {e}")));
            }
        };
        let (ws_sink, mut ws_stream) = socket.split();

        // Wait for the session announcement carrying our identity
        let assigned = loop {
            let msg = match ws_stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    *self.state.write().await = SyncState::Disconnected;
                    return Err(SyncError::Transport(format!("Handshake read failed: {e}")));
                }
                None => {
                    *self.state.write().await = SyncState::Disconnected;
                    return Err(SyncError::Protocol(
                        "Relay closed before announcing a session".to_string(),
                    ));
                }
            };

            if let Message::Text(text) = msg {
                match serde_json::from_str::<ServerEvent>(&text) {
                    Ok(ServerEvent::Session { id }) => break id,
                    Ok(ServerEvent::Move(snapshot)) => self.world.replace(snapshot).await,
                    Err(e) => {
                        warn!("Dropped unreadable relay frame during connect: {}", e);
                    }
                }
            }
        };

        *self.local_id.write().await = Some(assigned);
        *self.sink.lock().await = Some(ws_sink);
        *self.state.write().await = SyncState::Connected;
        info!("🔗 Connected to relay as {}", assigned);

        // Reader task: applies snapshots until the transport closes
        let world = self.world.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            while let Some(msg) = ws_stream.next().await {
                match msg {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerEvent>(&text) {
                        Ok(ServerEvent::Move(snapshot)) => world.replace(snapshot).await,
                        Ok(ServerEvent::Session { id }) => {
                            warn!("Ignoring unexpected session re-announcement for {}", id);
                        }
                        Err(e) => {
                            warn!("Dropped unreadable relay frame: {}", e);
                        }
                    },
                    Ok(Message::Close(_)) => {
                        debug!("🔌 Relay requested close");
                        break;
                    }
                    Err(e) => {
                        error!("WebSocket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }

            *state.write().await = SyncState::Disconnected;
            info!("👋 Disconnected from relay");
        });

        Ok(())
    }

    /// Sends the local participant's new pose to the relay.
    ///
    /// Fire-and-forget: every local pose change produces one frame, with no
    /// throttling. While not `Connected` the update is dropped with a debug
    /// log — a pose sent during connection setup or after a disconnect is
    /// stale by the time it could be delivered anyway.
    pub async fn send_pose(&self, position: [f64; 3], rotation: [f64; 3]) -> Result<(), SyncError> {
        if *self.state.read().await != SyncState::Connected {
            debug!("Dropping pose update while not connected");
            return Ok(());
        }

        let id = match *self.local_id.read().await {
            Some(id) => id,
            None => {
                debug!("Dropping pose update before identity assignment");
                return Ok(());
            }
        };

        let frame = serde_json::to_string(&ClientEvent::Move(PoseUpdate {
            id,
            position,
            rotation,
        }))
        .map_err(|e| SyncError::Protocol(e.to_string()))?;

        let mut sink = self.sink.lock().await;
        if let Some(sink) = sink.as_mut() {
            sink.send(Message::Text(frame.into()))
                .await
                .map_err(|e| SyncError::Transport(format!("Failed to send pose: {e}")))?;
        }
        Ok(())
    }

    /// The identity the relay assigned to this client, once known.
    pub async fn id(&self) -> Option<ParticipantId> {
        *self.local_id.read().await
    }

    /// Current connection state.
    pub async fn state(&self) -> SyncState {
        *self.state.read().await
    }

    /// The full mirror of the relay's last broadcast snapshot.
    pub async fn world(&self) -> RegistrySnapshot {
        self.world.mirror.read().await.clone()
    }

    /// The mirror minus the local identity — the set of other participants
    /// to render. The local avatar is driven by local input, not by the
    /// echoed snapshot.
    pub async fn others(&self) -> RegistrySnapshot {
        let local = *self.local_id.read().await;
        let mirror = self.world.mirror.read().await;
        mirror
            .iter()
            .filter(|(id, _)| Some(**id) != local)
            .map(|(id, pose)| (*id, *pose))
            .collect()
    }

    /// Subscribes to snapshot changes.
    ///
    /// The returned listener is released exactly once, when dropped.
    pub fn subscribe(&self) -> PoseListener {
        self.listeners.fetch_add(1, Ordering::Relaxed);
        PoseListener {
            receiver: self.world.snapshot_tx.subscribe(),
            listeners: self.listeners.clone(),
        }
    }

    /// Number of currently live pose listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.load(Ordering::Relaxed)
    }

    /// Closes the connection and transitions to `Disconnected`.
    ///
    /// Safe to call more than once; a second close is a no-op.
    pub async fn close(&self) {
        *self.state.write().await = SyncState::Disconnected;
        let mut sink = self.sink.lock().await;
        if let Some(mut sink) = sink.take() {
            let _ = sink.send(Message::Close(None)).await;
        }
    }
}

impl Default for SyncClient {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_protocol::Pose;

    #[tokio::test(flavor = "multi_thread")]
    async fn new_client_starts_disconnected() {
        let client = SyncClient::new();
        assert_eq!(client.state().await, SyncState::Disconnected);
        assert_eq!(client.id().await, None);
        assert!(client.world().await.is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn send_while_disconnected_is_dropped_quietly() {
        let client = SyncClient::new();
        client
            .send_pose([1.0, 0.0, 0.0], [0.0, 0.0, 0.0])
            .await
            .expect("dropped send is not an error");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn mirror_replacement_is_wholesale() {
        let client = SyncClient::new();

        let a = ParticipantId::new();
        let b = ParticipantId::new();

        let mut first = RegistrySnapshot::new();
        first.insert(a, Pose::default());
        first.insert(b, Pose::default());
        client.world.replace(first).await;

        // The next snapshot no longer contains B; the mirror must not
        // retain B's stale entry
        let mut second = RegistrySnapshot::new();
        second.insert(a, Pose::new([1.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
        client.world.replace(second.clone()).await;

        assert_eq!(client.world().await, second);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn others_excludes_the_local_identity() {
        let client = SyncClient::new();

        let a = ParticipantId::new();
        let b = ParticipantId::new();
        let c = ParticipantId::new();
        *client.local_id.write().await = Some(a);

        let mut snapshot = RegistrySnapshot::new();
        snapshot.insert(a, Pose::default());
        snapshot.insert(b, Pose::default());
        snapshot.insert(c, Pose::default());
        client.world.replace(snapshot).await;

        let others = client.others().await;
        assert_eq!(others.len(), 2);
        assert!(!others.contains_key(&a));
        assert!(others.contains_key(&b));
        assert!(others.contains_key(&c));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listener_is_released_exactly_once_on_drop() {
        let client = SyncClient::new();
        assert_eq!(client.listener_count(), 0);

        let first = client.subscribe();
        let second = client.subscribe();
        assert_eq!(client.listener_count(), 2);

        drop(first);
        assert_eq!(client.listener_count(), 1);
        drop(second);
        assert_eq!(client.listener_count(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn listener_observes_snapshot_changes() {
        let client = SyncClient::new();
        let mut listener = client.subscribe();

        let id = ParticipantId::new();
        let mut snapshot = RegistrySnapshot::new();
        snapshot.insert(id, Pose::new([3.0, 0.0, 0.0], [0.0, 0.0, 0.0]));
        client.world.replace(snapshot.clone()).await;

        listener.changed().await.expect("change observed");
        assert_eq!(listener.latest(), snapshot);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_is_idempotent() {
        let client = SyncClient::new();
        client.close().await;
        client.close().await;
        assert_eq!(client.state().await, SyncState::Disconnected);
    }
}
