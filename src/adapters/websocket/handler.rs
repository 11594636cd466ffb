//! WebSocket upgrade handler and per-connection pump loops.
//!
//! Handles the HTTP → WebSocket upgrade and the connection lifecycle:
//! 1. Verify the bearer token from the `?token=` query parameter
//! 2. Upgrade to WebSocket with the configured frame-size cap
//! 3. Bind the verified identity to a new Connection and register it
//! 4. Run the read/write pump pair until either side dies
//! 5. Unregister exactly once, releasing indices and advisory locks
//!
//! # Liveness
//!
//! The write loop pings on a fixed period; the read loop keeps a
//! deadline that only a pong (protocol frame or `pong` envelope)
//! pushes forward. A client that stops answering is torn down no later
//! than one read-deadline interval after its last liveness frame.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, timeout_at, Instant};

use crate::config::WebSocketConfig;
use crate::domain::foundation::ConnectionIdentity;
use crate::ports::TokenVerifier;

use super::connection::{Connection, OutboundFrame};
use super::hub::Hub;
use super::messages::{Envelope, MessageType};

/// State required for WebSocket handling.
#[derive(Clone)]
pub struct WebSocketState {
    /// The process-wide connection hub.
    pub hub: Arc<Hub>,

    /// Verifier for the upgrade bearer token.
    pub verifier: Arc<dyn TokenVerifier>,

    /// Pump and liveness tuning.
    pub settings: WebSocketConfig,
}

impl WebSocketState {
    /// Create a new WebSocket state.
    pub fn new(hub: Arc<Hub>, verifier: Arc<dyn TokenVerifier>, settings: WebSocketConfig) -> Self {
        Self {
            hub,
            verifier,
            settings,
        }
    }
}

/// Query parameters of the upgrade request.
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Pre-issued bearer token; browsers cannot set headers on
    /// WebSocket handshakes, hence the query parameter.
    pub token: Option<String>,
}

/// Handle WebSocket upgrade requests.
///
/// Route: `GET /ws?token=<bearer JWT>`
///
/// The token is verified **before** the protocol upgrade; a missing or
/// invalid token yields `401` and no upgrade takes place.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<WebSocketState>,
) -> Response {
    let Some(token) = query.token else {
        return unauthorized("Missing access token");
    };

    let identity = match state.verifier.verify(&token).await {
        Ok(identity) => identity,
        Err(error) => {
            tracing::debug!(%error, "rejecting WebSocket upgrade");
            return unauthorized("Invalid access token");
        }
    };

    ws.max_message_size(state.settings.max_frame_bytes)
        .on_upgrade(move |socket| handle_socket(socket, identity, state))
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": message,
            "code": "AUTH_ERROR"
        })),
    )
        .into_response()
}

/// Run an established connection until either pump loop exits.
///
/// Socket teardown is idempotent: whichever loop dies first, the other
/// is aborted and cleanup runs exactly once.
async fn handle_socket(socket: WebSocket, identity: ConnectionIdentity, state: WebSocketState) {
    let (sink, stream) = socket.split();

    let (conn, outbound_rx) =
        Connection::new(identity, state.settings.outbound_queue_capacity);
    let conn = Arc::new(conn);
    state.hub.register(Arc::clone(&conn)).await;

    let mut write_task = tokio::spawn(write_loop(
        sink,
        outbound_rx,
        state.settings.write_timeout(),
        state.settings.ping_interval(),
    ));
    let mut read_task = tokio::spawn(read_loop(
        stream,
        Arc::clone(&conn),
        Arc::clone(&state.hub),
        state.settings.read_timeout(),
    ));

    tokio::select! {
        _ = &mut write_task => read_task.abort(),
        _ = &mut read_task => write_task.abort(),
    }

    state.hub.unregister(conn.id()).await;
}

/// Inbound pump: decode frames and dispatch them to the hub.
///
/// Exits on transport error, protocol violation (including oversized
/// frames), close frame, or liveness deadline expiry. Undecodable
/// frames are dropped and logged; the connection stays open.
async fn read_loop(
    mut stream: SplitStream<WebSocket>,
    conn: Arc<Connection>,
    hub: Arc<Hub>,
    read_timeout: std::time::Duration,
) {
    let mut deadline = Instant::now() + read_timeout;

    loop {
        let frame = match timeout_at(deadline, stream.next()).await {
            Err(_) => {
                tracing::debug!(connection_id = %conn.id(), "liveness deadline expired");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(error))) => {
                tracing::debug!(connection_id = %conn.id(), %error, "read error");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        match frame {
            Message::Text(text) => match serde_json::from_str::<Envelope>(&text) {
                Ok(envelope) => {
                    if envelope.message_type == MessageType::Pong {
                        deadline = Instant::now() + read_timeout;
                    }
                    hub.handle_client_message(&conn, envelope).await;
                }
                Err(error) => {
                    tracing::debug!(
                        connection_id = %conn.id(),
                        %error,
                        "dropping undecodable frame"
                    );
                }
            },
            Message::Pong(_) => {
                deadline = Instant::now() + read_timeout;
            }
            // Protocol pings are answered by the transport layer.
            Message::Ping(_) => {}
            Message::Binary(_) => {
                tracing::warn!(
                    connection_id = %conn.id(),
                    "dropping unsupported binary frame"
                );
            }
            Message::Close(_) => {
                tracing::debug!(connection_id = %conn.id(), "client sent close frame");
                break;
            }
        }
    }
}

/// Outbound pump: flush the queue and keep the liveness pings going.
///
/// Exits on write failure or when the close signal arrives (queued by
/// the hub at unregistration), in which case it emits a close frame.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<OutboundFrame>,
    write_timeout: std::time::Duration,
    ping_interval: std::time::Duration,
) {
    let mut ping = interval_at(Instant::now() + ping_interval, ping_interval);

    loop {
        tokio::select! {
            frame = outbound.recv() => match frame {
                Some(OutboundFrame::Message(text)) => {
                    match timeout(write_timeout, sink.send(Message::Text(text))).await {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => {
                            tracing::debug!(%error, "write error");
                            break;
                        }
                        Err(_) => {
                            tracing::debug!("write deadline expired");
                            break;
                        }
                    }
                }
                Some(OutboundFrame::Close) | None => {
                    let _ = timeout(write_timeout, sink.send(Message::Close(None))).await;
                    break;
                }
            },
            _ = ping.tick() => {
                let sent = timeout(write_timeout, sink.send(Message::Ping(Vec::new()))).await;
                if !matches!(sent, Ok(Ok(()))) {
                    tracing::debug!("ping write failed");
                    break;
                }
            }
        }
    }
}

/// Create the axum router for the WebSocket endpoint.
///
/// # Example
///
/// ```ignore
/// let app = Router::new()
///     .nest("/api/v1", websocket_router())
///     .with_state(ws_state);
/// ```
pub fn websocket_router() -> axum::Router<WebSocketState> {
    use axum::routing::get;

    axum::Router::new().route("/ws", get(ws_handler))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::auth::MockTokenVerifier;
    use crate::domain::foundation::{CompanyId, UserId};
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn test_identity() -> ConnectionIdentity {
        ConnectionIdentity::new(
            UserId::new("user-1").unwrap(),
            Some(CompanyId::new("co-1").unwrap()),
            "user-1@example.com",
        )
    }

    fn test_state(verifier: MockTokenVerifier) -> WebSocketState {
        WebSocketState::new(
            Hub::new(),
            Arc::new(verifier),
            WebSocketConfig::default(),
        )
    }

    fn upgrade_request(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header("host", "localhost")
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn upgrade_without_token_is_rejected() {
        let app = websocket_router().with_state(test_state(MockTokenVerifier::new()));

        let response = app.oneshot(upgrade_request("/ws")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upgrade_with_invalid_token_is_rejected() {
        let app = websocket_router().with_state(test_state(MockTokenVerifier::new()));

        let response = app
            .oneshot(upgrade_request("/ws?token=bogus"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn upgrade_with_valid_token_switches_protocols() {
        let verifier = MockTokenVerifier::new().with_identity("good-token", test_identity());
        let app = websocket_router().with_state(test_state(verifier));

        let response = app
            .oneshot(upgrade_request("/ws?token=good-token"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SWITCHING_PROTOCOLS);
    }

    #[tokio::test]
    async fn websocket_state_is_cloneable() {
        let state = test_state(MockTokenVerifier::new());
        let _clone = state.clone();
    }
}
