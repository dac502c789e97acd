//! Signal handling for graceful relay shutdown.
//!
//! This module provides cross-platform signal handling to allow the relay
//! to shut down gracefully when receiving termination signals.

use tokio::signal;
use tracing::info;

/// Sets up graceful shutdown signal handling for the application.
///
/// Listens for termination signals (SIGINT, SIGTERM on Unix; Ctrl+C on
/// Windows) and returns when one is received.
///
/// # Platform Support
///
/// * **Unix platforms**: Handles SIGINT and SIGTERM signals
/// * **Windows**: Handles Ctrl+C signal
///
/// # Returns
///
/// `Ok(())` when a shutdown signal is received, or an error if signal
/// handling setup failed.
pub async fn setup_signal_handlers() -> Result<(), Box<dyn std::error::Error>> {
    setup_signal_handlers_silent().await?;
    info!("📡 Received shutdown signal - initiating graceful shutdown");
    Ok(())
}

/// Waits for a termination signal without logging.
///
/// Used a second time after shutdown has begun so a repeated signal can
/// force an immediate exit.
pub async fn setup_signal_handlers_silent() -> Result<(), Box<dyn std::error::Error>> {
    #[cfg(unix)]
    {
        use signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = sigint.recv() => (),
            _ = sigterm.recv() => ()
        }
    }

    #[cfg(windows)]
    signal::ctrl_c().await?;

    Ok(())
}
