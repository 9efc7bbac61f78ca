//! Connection handlers for the relay server.
//!
//! This module owns the transport edge: the axum app, the WebSocket
//! upgrade, and the per-connection task that serializes one connection's
//! inbound frames and outbox drain into a single loop.

use crate::config::Config;
use crate::dispatch::Dispatch;
use crate::metrics::{self, ConnectionMetricsGuard};
use crate::session::{self, Session};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use chatter_core::{generate_connection_id, Registry, Router as BroadcastRouter};
use chatter_protocol::wire;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// The live connection set.
    pub registry: Arc<Registry>,
    /// The broadcast router over that registry.
    pub router: BroadcastRouter,
    /// Destination dispatch table, resolved once at startup.
    pub dispatch: Dispatch,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state.
    #[must_use]
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(Registry::new());
        Self {
            router: BroadcastRouter::new(Arc::clone(&registry)),
            registry,
            dispatch: Dispatch::new(),
            config,
        }
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone()));

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .with_state(state);

    // Bind and serve
    let addr = config.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!("Chatter relay listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app).await?;

    Ok(())
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let max_message_size = state.config.limits.max_message_size;
    ws.max_message_size(max_message_size)
        .on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
///
/// The connection is registered (unnamed) before the loop starts, so the
/// registry holds the handle for the whole transport lifetime; the
/// registration handshake only binds a name to it.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    let _metrics_guard = ConnectionMetricsGuard::new();

    let connection_id = generate_connection_id();
    debug!(connection = %connection_id, "WebSocket connected");

    // The outbox the router delivers broadcasts into.
    let (outbox_tx, mut outbox_rx) = mpsc::unbounded_channel();
    state.registry.register(connection_id.clone(), outbox_tx);

    let mut session = Session::new(connection_id.clone());
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            biased;

            // Drain broadcasts destined for this connection
            Some(envelope) = outbox_rx.recv() => {
                match wire::encode_broadcast(&envelope) {
                    Ok(text) => {
                        metrics::record_envelope(text.len(), "outbound");
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        error!(connection = %connection_id, error = %e, "Broadcast encoding failed");
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        metrics::record_envelope(text.len(), "inbound");
                        match wire::decode_client(&text) {
                            Ok(frame) => session::handle_frame(&state, &mut session, frame),
                            // Fail soft: a bad frame never tears the session down
                            Err(e) => {
                                warn!(connection = %connection_id, error = %e, "Malformed frame, dropped");
                                metrics::record_dropped_frame("malformed");
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        warn!(connection = %connection_id, "Binary frame, dropped");
                        metrics::record_dropped_frame("binary");
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: unbind from the registry and broadcast LEAVE if named
    session::close(&state, &mut session);

    debug!(connection = %connection_id, "WebSocket disconnected");
}
