//! Unix domain socket server for IPC
//!
//! Provides request-response access to the router and pushes session events
//! to subscribed clients.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::events::SessionEvent;
use crate::router::ModeRouter;

use super::protocol::{DaemonStatus, Request, Response, MAX_MESSAGE_LEN};

/// IPC Server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    state: Arc<ServerState>,
    shutdown_tx: broadcast::Sender<()>,
}

/// Shared server state
struct ServerState {
    /// One lock for the router keeps each turn exclusive
    router: Mutex<ModeRouter>,
    events: broadcast::Sender<SessionEvent>,
    start_time: Instant,
}

impl Server {
    /// Create a new IPC server bound to `socket_path`
    pub fn new(
        socket_path: &Path,
        router: ModeRouter,
        events: broadcast::Sender<SessionEvent>,
    ) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        let state = Arc::new(ServerState {
            router: Mutex::new(router),
            events,
            start_time: Instant::now(),
        });

        info!(?socket_path, "IPC server listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            state,
            shutdown_tx,
        })
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let state = Arc::clone(&self.state);
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, state) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection.
    ///
    /// Requests are read on a separate task so a subscribed client can get
    /// event pushes while no request is pending.
    async fn handle_client(stream: UnixStream, state: Arc<ServerState>) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel::<Result<Request, String>>(8);

        let reader_task = tokio::spawn(async move {
            loop {
                match Self::read_message(&mut reader).await {
                    Ok(Some(body)) => {
                        let request = serde_json::from_slice::<Request>(&body)
                            .map_err(|e| format!("failed to parse request: {e}"));
                        if request_tx.send(request).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "failed to read request, disconnecting");
                        break;
                    }
                }
            }
        });

        let mut events: Option<broadcast::Receiver<SessionEvent>> = None;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else { break Ok(()) };
                    let response = match request {
                        Ok(request) => {
                            debug!(?request, "received request");
                            let (response, subscribe) = Self::process_request(request, &state).await;
                            if subscribe && events.is_none() {
                                events = Some(state.events.subscribe());
                                debug!("client subscribed to notifications");
                            }
                            response
                        }
                        Err(message) => Response::Error {
                            code: "bad_request".to_string(),
                            message,
                        },
                    };
                    if let Err(e) = Self::send_message(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = next_event(&mut events) => {
                    match event {
                        Ok(event) => {
                            if let Err(e) = Self::send_message(&mut writer, &Response::Event { event }).await {
                                break Err(e);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(n)) => {
                            warn!(skipped = n, "subscriber lagged, events dropped");
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            events = None;
                        }
                    }
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Read one length-prefixed message body; `None` on clean disconnect
    async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
        let mut len_buf = [0u8; 4];
        match reader.read_exact(&mut len_buf).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let len = u32::from_le_bytes(len_buf) as usize;
        if len > MAX_MESSAGE_LEN {
            anyhow::bail!("message too large: {len} bytes");
        }

        let mut body = vec![0u8; len];
        reader.read_exact(&mut body).await?;
        Ok(Some(body))
    }

    /// Send a length-prefixed JSON message
    async fn send_message<W, T>(writer: &mut W, msg: &T) -> Result<()>
    where
        W: AsyncWrite + Unpin,
        T: serde::Serialize,
    {
        let msg_bytes = serde_json::to_vec(msg)?;
        let msg_len = (msg_bytes.len() as u32).to_le_bytes();

        writer.write_all(&msg_len).await?;
        writer.write_all(&msg_bytes).await?;

        Ok(())
    }

    /// Process a request and return a response
    /// Returns (Response, should_subscribe)
    async fn process_request(request: Request, state: &ServerState) -> (Response, bool) {
        match request {
            Request::Ping => (Response::Pong, false),

            Request::GetStatus => {
                let router = state.router.lock().await;
                let status = DaemonStatus {
                    active_sessions: router.store().len(),
                    topics: router.store().content().len(),
                    uptime_secs: state.start_time.elapsed().as_secs(),
                    ..DaemonStatus::default()
                };
                (Response::Status(status), false)
            }

            Request::StartSession { persona } => {
                let (session_id, decision) = state.router.lock().await.start_session(persona);
                let prompt = decision.prompt();
                (
                    Response::SessionStarted {
                        session_id,
                        voice: decision.voice,
                        prompt,
                    },
                    false,
                )
            }

            Request::Utterance { session_id, text } => {
                let result = state
                    .router
                    .lock()
                    .await
                    .handle_utterance(&session_id, &text);
                let response = match result {
                    Ok(decision) => decision.into(),
                    Err(e) => e.into(),
                };
                (response, false)
            }

            Request::Intent { session_id, intent } => {
                let result = state.router.lock().await.route_intent(&session_id, intent);
                let response = match result {
                    Ok(decision) => decision.into(),
                    Err(e) => e.into(),
                };
                (response, false)
            }

            Request::GetSession { session_id } => {
                let router = state.router.lock().await;
                let response = match router.get(&session_id) {
                    Ok(record) => Response::Session {
                        session_id,
                        record: record.clone(),
                        complete: router.is_complete(&session_id).unwrap_or(false),
                    },
                    Err(e) => e.into(),
                };
                (response, false)
            }

            Request::EndSession { session_id } => {
                let result = state.router.lock().await.end_session(&session_id);
                let response = match result {
                    Ok(record) => Response::SessionEnded { session_id, record },
                    Err(e) => e.into(),
                };
                (response, false)
            }

            Request::ListTopics => {
                let items = state.router.lock().await.topics();
                (Response::Topics { items }, false)
            }

            Request::Subscribe => (Response::Subscribed, true),
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("IPC server shutdown complete");
    }
}

/// Next event for a subscribed client; never resolves for unsubscribed ones
async fn next_event(
    events: &mut Option<broadcast::Receiver<SessionEvent>>,
) -> Result<SessionEvent, broadcast::error::RecvError> {
    match events {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
