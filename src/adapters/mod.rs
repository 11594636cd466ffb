//! Adapters - Implementations of port interfaces.
//!
//! Adapters connect the gateway to the outside world:
//! - `auth` - token verification (JWT, mock)
//! - `websocket` - the push channel itself: hub, connections, wire protocol

pub mod auth;
pub mod websocket;

pub use auth::{JwtTokenVerifier, MockTokenVerifier};
pub use websocket::{Hub, WebSocketMessenger, WebSocketNotifier, WebSocketState};
