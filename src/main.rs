//! persona-daemon: background daemon for the barista and tutor voice personas
//!
//! Provides:
//! - Session state store (order records, tutor mode and topic)
//! - Mode router choosing the next script and voice per turn
//! - IPC server for the conversation engine
//!
//! No speech-to-text, text-to-speech, or LLM calls happen here.

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use persona_daemon::archive::OrderArchive;
use persona_daemon::config::Config;
use persona_daemon::events::SessionEvent;
use persona_daemon::ipc::Server;
use persona_daemon::lifecycle::ShutdownSignal;
use persona_daemon::router::ModeRouter;
use persona_daemon::session::SessionStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "persona-daemon starting");

    // Load configuration
    let config = Config::load()?;
    config.ensure_dirs()?;
    info!(?config.socket_path, ?config.content_path, "configuration loaded");

    // Content is loaded once and shared read-only
    let content = Arc::new(config.load_content()?);

    let shutdown = ShutdownSignal::new();

    // Router -> IPC subscribers and the log
    let (event_tx, _event_rx) = broadcast::channel::<SessionEvent>(64);

    let router = ModeRouter::new(
        SessionStore::new(content),
        config.voices.clone(),
        event_tx.clone(),
    )
    .with_archive(OrderArchive::new(config.orders_dir()));

    let server = Server::new(&config.socket_path, router, event_tx.clone())?;

    let mut log_rx = event_tx.subscribe();

    info!("daemon initialized, entering main loop");

    tokio::select! {
        // Run the IPC server (accepts client connections)
        result = server.run() => {
            if let Err(e) = result {
                error!(?e, "IPC server error");
            }
        }

        // Log session events
        _ = async {
            loop {
                match log_rx.recv().await {
                    Ok(event) => {
                        info!(session_id = %event.session_id(), %event, "session event");
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "session event receiver lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        break;
                    }
                }
            }
        } => {
            info!("session event logger exited");
        }

        // Wait for shutdown signal
        result = shutdown.wait() => {
            match result {
                Ok(()) => info!("shutdown signal received"),
                Err(e) => error!(?e, "signal handling failed"),
            }
        }
    }

    // Cleanup
    info!("shutting down...");

    server.shutdown().await;

    info!("persona-daemon stopped");

    Ok(())
}
