//! WebSocket adapters for the real-time push channel.
//!
//! This module is the heart of the gateway: it owns the live
//! connections, the company/user indices, the advisory lock table and
//! the wire protocol, and it implements the push ports consumed by the
//! notification and messaging modules.
//!
//! # Architecture
//!
//! ```text
//! caller modules                     browser / mobile clients
//!      │                                      ▲
//!      │ RealtimeNotifier /                   │ JSON text frames
//!      │ RealtimeMessenger                    │
//!      ▼                                      │
//! ┌──────────────┐   send_to_user    ┌────────────────┐
//! │  Notifier /  │──────────────────▶│      Hub       │
//! │  Messenger   │                   │  all/byCompany │
//! └──────────────┘                   │  byUser/locks  │
//!                                    └────────────────┘
//!                                       ▲          │ bounded queue
//!                        handle_client  │          ▼
//!                                    ┌────────────────┐
//!                                    │  Connection    │
//!                                    │  read ⇄ write  │
//!                                    └────────────────┘
//! ```
//!
//! # Components
//!
//! - [`messages`] - wire envelope and payload types
//! - [`connection`] - per-connection handle and bounded outbound queue
//! - [`hub`] - registry, lock table, broadcast and inbound routing
//! - [`handler`] - axum upgrade endpoint and the pump loops
//! - [`notifier`] / [`messenger`] - push ports over the hub

pub mod connection;
pub mod handler;
pub mod hub;
pub mod messages;
pub mod messenger;
pub mod notifier;

pub use connection::{Connection, OutboundFrame};
pub use handler::{websocket_router, ws_handler, WebSocketState};
pub use hub::{Hub, LockKey, RegistrySnapshot};
pub use messages::{
    AttachmentPayload, ChatMessagePayload, DashboardUpdatePayload, Envelope, MessageType,
    NotificationPayload, PresencePayload, ProtocolError, RecordLockPayload,
    TypingIndicatorPayload,
};
pub use messenger::WebSocketMessenger;
pub use notifier::WebSocketNotifier;
