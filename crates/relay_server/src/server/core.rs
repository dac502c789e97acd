//! Core relay server implementation.
//!
//! This module contains the main `RelayServer` struct and its
//! implementation, orchestrating the participant registry, connection
//! manager, and broadcast dispatcher behind an explicit lifecycle.

use crate::{
    broadcast::BroadcastDispatcher,
    config::ServerConfig,
    connection::ConnectionManager,
    error::ServerError,
    registry::ParticipantRegistry,
    server::handlers::handle_connection,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, Mutex};
use tracing::{error, info, warn};

/// The core relay server structure.
///
/// `RelayServer` owns the authoritative participant registry, the
/// connection manager, and the broadcast dispatcher, and drives the accept
/// loop that hands each connection to its own handler task. It is an owned
/// component with an explicit lifecycle — construct, `bind`/`start`,
/// `shutdown` — rather than ambient global state, so tests can run several
/// independent relays in parallel.
///
/// # Architecture
///
/// * **Participant Registry**: authoritative identity-to-pose map
/// * **Connection Manager**: connection lifecycle and frame fan-out
/// * **Broadcast Dispatcher**: snapshot publication after every mutation
/// * **Accept Loop**: task-per-connection WebSocket serving
pub struct RelayServer {
    /// Relay configuration settings
    config: ServerConfig,

    /// Authoritative identity-to-pose registry
    registry: Arc<ParticipantRegistry>,

    /// Manager for client connections and frame delivery
    connection_manager: Arc<ConnectionManager>,

    /// Dispatcher publishing registry snapshots to all connections
    dispatcher: Arc<BroadcastDispatcher>,

    /// Listener prepared by `bind`, consumed by `start`
    listener: Mutex<Option<TcpListener>>,

    /// Channel for coordinating relay shutdown
    shutdown_sender: broadcast::Sender<()>,
}

impl RelayServer {
    /// Creates a new relay server with the specified configuration.
    ///
    /// Initializes the registry, connection manager, and dispatcher. The
    /// relay is ready to `bind` and `start` after construction.
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(ParticipantRegistry::new());
        let connection_manager = Arc::new(ConnectionManager::new());
        let dispatcher = Arc::new(BroadcastDispatcher::new(
            registry.clone(),
            connection_manager.clone(),
        ));
        let (shutdown_sender, _) = broadcast::channel(1);

        Self {
            config,
            registry,
            connection_manager,
            dispatcher,
            listener: Mutex::new(None),
            shutdown_sender,
        }
    }

    /// Binds the listener ahead of `start` and returns the bound address.
    ///
    /// Useful when the configured port is 0 and the caller needs to know
    /// the address the OS picked — tests connect this way. Calling `start`
    /// without `bind` is also fine; it binds on its own.
    ///
    /// # Returns
    ///
    /// The local address the listener is bound to, or a `ServerError` if
    /// binding failed.
    pub async fn bind(&self) -> Result<SocketAddr, ServerError> {
        let listener = TcpListener::bind(self.config.bind_address)
            .await
            .map_err(|e| ServerError::Network(format!("Failed to bind listener: {e}")))?;
        let addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Failed to read local address: {e}")))?;

        let mut slot = self.listener.lock().await;
        *slot = Some(listener);
        Ok(addr)
    }

    /// Starts the relay and begins accepting connections.
    ///
    /// Runs the accept loop until `shutdown` is called or the listener
    /// fails. Each accepted connection is served by its own spawned task;
    /// a failure in one connection handler never affects the others.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the relay started and stopped cleanly, or a
    /// `ServerError` if there was a failure during startup.
    pub async fn start(&self) -> Result<(), ServerError> {
        // The guard must be released before the fallback bind: bind() locks
        // the same mutex and tokio's Mutex is not reentrant
        let listener = {
            let mut slot = self.listener.lock().await;
            slot.take()
        };
        let listener = match listener {
            Some(listener) => listener,
            None => {
                self.bind().await?;
                self.listener
                    .lock()
                    .await
                    .take()
                    .ok_or_else(|| ServerError::Internal("Listener missing after bind".to_string()))?
            }
        };

        let local_addr = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Failed to read local address: {e}")))?;
        info!("🚀 Relay listening on {}", local_addr);

        let mut shutdown_receiver = self.shutdown_sender.subscribe();

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            if self.connection_manager.connection_count().await
                                >= self.config.max_connections
                            {
                                warn!(
                                    "🚧 Connection limit ({}) reached, refusing {}",
                                    self.config.max_connections, addr
                                );
                                continue;
                            }

                            let connection_manager = self.connection_manager.clone();
                            let registry = self.registry.clone();
                            let dispatcher = self.dispatcher.clone();
                            let handshake_timeout =
                                Duration::from_secs(self.config.connection_timeout);

                            // Spawn individual connection handler
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(
                                    stream,
                                    addr,
                                    handshake_timeout,
                                    connection_manager,
                                    registry,
                                    dispatcher,
                                )
                                .await
                                {
                                    error!("Connection error: {:?}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Failed to accept connection: {}", e);
                            break;
                        }
                    }
                }
                _ = shutdown_receiver.recv() => {
                    info!("Internal shutdown signal received");
                    break;
                }
            }
        }

        info!("Relay stopped");
        Ok(())
    }

    /// Initiates relay shutdown.
    ///
    /// Signals the accept loop to stop. In-flight connection handlers run
    /// to completion of their own accord when their streams close.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down relay...");
        let _ = self.shutdown_sender.send(());
        Ok(())
    }

    /// Gets a reference to the participant registry.
    pub fn registry(&self) -> Arc<ParticipantRegistry> {
        self.registry.clone()
    }

    /// Gets a reference to the connection manager.
    pub fn connection_manager(&self) -> Arc<ConnectionManager> {
        self.connection_manager.clone()
    }

    /// Gets a reference to the broadcast dispatcher.
    pub fn dispatcher(&self) -> Arc<BroadcastDispatcher> {
        self.dispatcher.clone()
    }

    /// Gets the relay configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}
