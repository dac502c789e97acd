//! End-to-end relay scenarios over real WebSocket connections.
//!
//! Each test binds a fresh relay on an ephemeral port, connects plain
//! tungstenite clients, and drives the wire protocol exactly as a real
//! client would: read the `session` announcement, send `move` frames,
//! and assert on the snapshots that come back.

use futures::{SinkExt, StreamExt};
use presence_protocol::{ClientEvent, ParticipantId, PoseUpdate, RegistrySnapshot, ServerEvent};
use relay_server::{create_relay_with_config, RelayServer, ServerConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type ClientSocket = WebSocketStream<MaybeTlsStream<TcpStream>>;

const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Binds a relay on an ephemeral port and runs it in the background.
async fn spawn_relay() -> (Arc<RelayServer>, SocketAddr) {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().expect("valid address"),
        ..Default::default()
    };
    let relay = Arc::new(create_relay_with_config(config));
    let addr = relay.bind().await.expect("relay binds");

    let relay_task = relay.clone();
    tokio::spawn(async move {
        relay_task.start().await.expect("relay runs");
    });

    (relay, addr)
}

/// Connects a client and waits for its `session` identity announcement.
async fn connect_client(addr: SocketAddr) -> (ClientSocket, ParticipantId) {
    let (mut socket, _) = connect_async(format!("ws://{addr}"))
        .await
        .expect("client connects");

    let id = loop {
        let msg = timeout(RECV_TIMEOUT, socket.next())
            .await
            .expect("session frame arrives in time")
            .expect("stream open")
            .expect("frame readable");
        if let Message::Text(text) = msg {
            match serde_json::from_str::<ServerEvent>(&text).expect("valid server frame") {
                ServerEvent::Session { id } => break id,
                ServerEvent::Move(_) => continue,
            }
        }
    };

    (socket, id)
}

/// Reads frames until the next registry snapshot.
async fn next_snapshot(socket: &mut ClientSocket) -> RegistrySnapshot {
    loop {
        let msg = timeout(RECV_TIMEOUT, socket.next())
            .await
            .expect("snapshot arrives in time")
            .expect("stream open")
            .expect("frame readable");
        if let Message::Text(text) = msg {
            if let ServerEvent::Move(snapshot) =
                serde_json::from_str::<ServerEvent>(&text).expect("valid server frame")
            {
                return snapshot;
            }
        }
    }
}

/// Reads snapshots until one satisfies the predicate.
async fn snapshot_matching<F>(socket: &mut ClientSocket, mut predicate: F) -> RegistrySnapshot
where
    F: FnMut(&RegistrySnapshot) -> bool,
{
    loop {
        let snapshot = next_snapshot(socket).await;
        if predicate(&snapshot) {
            return snapshot;
        }
    }
}

async fn send_move(socket: &mut ClientSocket, id: ParticipantId, position: [f64; 3]) {
    let frame = serde_json::to_string(&ClientEvent::Move(PoseUpdate {
        id,
        position,
        rotation: [0.0, 0.0, 0.0],
    }))
    .expect("serializes");
    socket
        .send(Message::Text(frame.into()))
        .await
        .expect("frame sent");
}

#[tokio::test(flavor = "multi_thread")]
async fn single_client_receives_own_snapshot() {
    let (relay, addr) = spawn_relay().await;
    let (mut client, id) = connect_client(addr).await;

    send_move(&mut client, id, [1.0, 0.0, 0.0]).await;

    let snapshot = next_snapshot(&mut client).await;
    assert_eq!(snapshot.len(), 1);
    let pose = snapshot.get(&id).expect("own entry present");
    assert_eq!(pose.position, [1.0, 0.0, 0.0]);
    assert_eq!(pose.rotation, [0.0, 0.0, 0.0]);

    relay.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn update_reaches_every_connected_client() {
    let (relay, addr) = spawn_relay().await;
    let (mut client_a, id_a) = connect_client(addr).await;
    let (mut client_b, id_b) = connect_client(addr).await;

    // B establishes a last known pose first
    send_move(&mut client_b, id_b, [5.0, 0.0, 5.0]).await;
    snapshot_matching(&mut client_b, |s| s.contains_key(&id_b)).await;

    // A's update must reach both A and B, with B's pose intact
    send_move(&mut client_a, id_a, [2.0, 1.0, 0.0]).await;

    for client in [&mut client_a, &mut client_b] {
        let snapshot = snapshot_matching(client, |s| s.contains_key(&id_a)).await;
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot.get(&id_a).expect("A present").position, [2.0, 1.0, 0.0]);
        assert_eq!(snapshot.get(&id_b).expect("B present").position, [5.0, 0.0, 5.0]);
    }

    relay.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn disconnect_removes_ghost_entry() {
    let (relay, addr) = spawn_relay().await;
    let (mut client_a, id_a) = connect_client(addr).await;
    let (mut client_b, id_b) = connect_client(addr).await;

    send_move(&mut client_a, id_a, [1.0, 0.0, 0.0]).await;
    send_move(&mut client_b, id_b, [2.0, 0.0, 0.0]).await;
    snapshot_matching(&mut client_a, |s| s.len() == 2).await;

    client_b.close(None).await.expect("B closes");

    // The disconnect broadcast leaves only A in the registry
    let snapshot = snapshot_matching(&mut client_a, |s| !s.contains_key(&id_b)).await;
    assert_eq!(snapshot.len(), 1);
    assert!(snapshot.contains_key(&id_a));
    assert!(relay.registry().snapshot().await.contains_key(&id_a));

    relay.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn back_to_back_updates_keep_the_last_writer() {
    let (relay, addr) = spawn_relay().await;
    let (mut client, id) = connect_client(addr).await;

    send_move(&mut client, id, [1.0, 0.0, 0.0]).await;
    send_move(&mut client, id, [2.0, 0.0, 0.0]).await;

    // Regardless of processing delay between the two frames, the final
    // registry entry reflects the second update only
    snapshot_matching(&mut client, |s| {
        s.get(&id).map(|p| p.position) == Some([2.0, 0.0, 0.0])
    })
    .await;

    let registry = relay.registry().snapshot().await;
    assert_eq!(registry.get(&id).expect("entry present").position, [2.0, 0.0, 0.0]);

    relay.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn start_without_bind_accepts_connections() {
    // No bind() call here: start() must bring the listener up on its own
    let addr: SocketAddr = "127.0.0.1:39217".parse().expect("valid address");
    let config = ServerConfig {
        bind_address: addr,
        ..Default::default()
    };
    let relay = Arc::new(create_relay_with_config(config));

    let relay_task = relay.clone();
    tokio::spawn(async move {
        relay_task.start().await.expect("relay runs");
    });

    // Retry until the accept loop is listening
    timeout(RECV_TIMEOUT, async {
        loop {
            if TcpStream::connect(addr).await.is_ok() {
                break;
            }
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("relay starts listening in time");

    let (mut client, id) = connect_client(addr).await;
    send_move(&mut client, id, [1.0, 0.0, 0.0]).await;
    let snapshot = next_snapshot(&mut client).await;
    assert!(snapshot.contains_key(&id));

    relay.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn silent_tcp_connection_is_dropped_after_handshake_timeout() {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().expect("valid address"),
        connection_timeout: 1,
        ..Default::default()
    };
    let relay = Arc::new(create_relay_with_config(config));
    let addr = relay.bind().await.expect("relay binds");

    let relay_task = relay.clone();
    tokio::spawn(async move {
        relay_task.start().await.expect("relay runs");
    });

    // Open a raw TCP connection and never speak WebSocket
    let mut socket = TcpStream::connect(addr).await.expect("tcp connects");
    let mut buf = [0u8; 1];
    let read = timeout(RECV_TIMEOUT, socket.read(&mut buf))
        .await
        .expect("relay hangs up in time")
        .expect("read completes");
    assert_eq!(read, 0, "relay must close a connection that never completes the handshake");

    assert_eq!(relay.connection_manager().connection_count().await, 0);

    relay.shutdown().await.expect("shutdown");
}

#[tokio::test(flavor = "multi_thread")]
async fn spoofed_identity_never_enters_the_registry() {
    let (relay, addr) = spawn_relay().await;
    let (mut client, _id) = connect_client(addr).await;

    // Assert a foreign identity; the relay drops the frame
    let foreign = ParticipantId::new();
    send_move(&mut client, foreign, [9.0, 9.0, 9.0]).await;

    // A follow-up valid frame still works on the same connection, which
    // also gives the relay time to have processed the spoofed one
    let (mut witness, witness_id) = connect_client(addr).await;
    send_move(&mut witness, witness_id, [1.0, 0.0, 0.0]).await;
    snapshot_matching(&mut witness, |s| s.contains_key(&witness_id)).await;

    assert!(!relay.registry().snapshot().await.contains_key(&foreign));

    relay.shutdown().await.expect("shutdown");
}
