//! WebSocket gateway and status API for observers.
//!
//! Observers connect to `/ws`, send their reports as JSON frames and receive
//! session updates the same way. A small REST surface exposes health and the
//! current status snapshot.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::dispatch::DispatcherHandle;
use crate::protocol::{InboundMessage, ObserverId, OutboundMessage};
use crate::registry::ObserverMessenger;
use crate::status::{StatusCell, StatusView};

/// Default listen address of the gateway.
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8125";

/// Shared state for the API handlers.
pub struct ApiState {
    /// Live WebSocket connections, keyed by observer id.
    pub hub: Arc<ObserverHub>,
    /// Entry point into the session.
    pub dispatcher: DispatcherHandle,
    /// Latest status snapshot for `/api/status`.
    pub status: Arc<StatusCell>,
}

/// Connection-side fan-out: one outbound queue per live WebSocket.
///
/// The registry talks to this through [`ObserverMessenger`]; each socket
/// task drains its own queue onto the wire. Ids are minted here and never
/// reused within a process.
#[derive(Default)]
pub struct ObserverHub {
    connections: parking_lot::RwLock<HashMap<ObserverId, mpsc::UnboundedSender<OutboundMessage>>>,
    next_id: AtomicU64,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an id and an outbound queue for a new connection.
    pub fn register(&self) -> (ObserverId, mpsc::UnboundedReceiver<OutboundMessage>) {
        let id = ObserverId::new(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (tx, rx) = mpsc::unbounded_channel();
        self.connections.write().insert(id, tx);
        (id, rx)
    }

    /// Forget a connection. Queued messages for it are dropped.
    pub fn unregister(&self, id: ObserverId) {
        self.connections.write().remove(&id);
    }

    pub fn connection_count(&self) -> usize {
        self.connections.read().len()
    }
}

#[async_trait]
impl ObserverMessenger for ObserverHub {
    async fn send(&self, to: ObserverId, message: &OutboundMessage) -> Result<()> {
        let sender = self
            .connections
            .read()
            .get(&to)
            .cloned()
            .with_context(|| format!("observer {to} is not connected"))?;
        sender
            .send(message.clone())
            .map_err(|_| anyhow!("observer {to} queue is closed"))
    }

    async fn enumerate(&self) -> Vec<ObserverId> {
        let mut ids: Vec<ObserverId> = self.connections.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }
}

/// Build the gateway router.
pub fn build_router(state: Arc<ApiState>) -> Router {
    Router::new()
        .route("/ws", get(observer_ws))
        .route("/api/status", get(session_status))
        .route("/api/health", get(health_check))
        .with_state(state)
}

/// GET /ws - observer WebSocket endpoint
async fn observer_ws(ws: WebSocketUpgrade, State(state): State<Arc<ApiState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one observer connection until either side gives up.
async fn handle_socket(mut socket: WebSocket, state: Arc<ApiState>) {
    let (id, mut outbound_rx) = state.hub.register();
    debug!("Observer {id} connected");

    loop {
        tokio::select! {
            // Forward session updates to the observer
            message = outbound_rx.recv() => {
                match message {
                    Some(message) => {
                        let text = match serde_json::to_string(&message) {
                            Ok(text) => text,
                            Err(err) => {
                                error!("Failed to encode frame for observer {id}: {err}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            debug!("Observer {id} hung up mid-send");
                            break;
                        }
                    }
                    None => break,
                }
            }
            // Handle observer reports
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        route_inbound(&state.dispatcher, id, &text).await;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Observer {id} closed the connection");
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ignore binary frames
                    }
                    Some(Err(err)) => {
                        warn!("WebSocket error from observer {id}: {err}");
                        break;
                    }
                }
            }
        }
    }

    state.hub.unregister(id);
    state.dispatcher.observer_disconnected(id);
    debug!("Observer {id} disconnected");
}

/// Parse one observer frame and hand it to the dispatcher. Frames that do
/// not parse are logged and dropped; the connection stays up.
async fn route_inbound(dispatcher: &DispatcherHandle, from: ObserverId, text: &str) {
    let message: InboundMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            warn!("Ignoring malformed frame from observer {from}: {err}");
            return;
        }
    };

    match message {
        InboundMessage::Hello => dispatcher.hello(from),
        InboundMessage::ToggleMute => dispatcher.toggle_mute(),
        InboundMessage::Setting { setting } => dispatcher.set_setting(setting).await,
        InboundMessage::Location { location } => dispatcher.set_location(location),
    }
}

/// GET /api/status - current badge and tooltip
async fn session_status(State(state): State<Arc<ApiState>>) -> Json<StatusView> {
    Json(state.status.get())
}

/// GET /api/health - health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// Start the gateway server.
pub async fn start_server(state: Arc<ApiState>, addr: SocketAddr) -> Result<()> {
    let router = build_router(state);

    info!("Starting observer gateway on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind gateway server")?;

    axum::serve(listener, router)
        .await
        .context("Gateway server error")?;

    Ok(())
}
