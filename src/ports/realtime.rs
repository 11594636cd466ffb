//! Real-time push ports consumed by caller modules.
//!
//! The notification and messaging services own their entities and
//! their persistence; after storing a record they hand it to one of
//! these ports for best-effort delivery over any live connections.
//! There is no retry, no queuing and no acknowledgment: when the
//! recipient has zero open connections the push is simply skipped and
//! the durable record remains the system of record.
//!
//! `is_user_online` exists so callers can decide on fallback delivery
//! (for example an out-of-band push notification) when the recipient
//! is offline.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::foundation::{ConversationId, UserId};
use crate::domain::{ChatMessage, Notification};

/// Errors that can occur while handing an entity to the push channel.
///
/// Delivery itself is best-effort and never reports failure; only the
/// translation into a wire envelope can fail.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The entity could not be encoded into a wire envelope.
    #[error("Failed to encode push payload: {0}")]
    Encode(String),
}

/// Port for pushing persisted notifications to connected clients.
#[async_trait]
pub trait RealtimeNotifier: Send + Sync {
    /// Push a notification to every live connection of its recipient.
    ///
    /// Zero live connections is not an error.
    async fn notify_user(&self, notification: &Notification) -> Result<(), DeliveryError>;

    /// Check whether the user has at least one live connection.
    async fn is_user_online(&self, user_id: &UserId) -> bool;
}

/// Port for pushing chat traffic to connected clients.
#[async_trait]
pub trait RealtimeMessenger: Send + Sync {
    /// Push an encrypted chat message to every live connection of the
    /// recipient.
    async fn send_chat_message(
        &self,
        recipient_id: &UserId,
        message: &ChatMessage,
    ) -> Result<(), DeliveryError>;

    /// Push a typing indicator to the recipient.
    async fn send_typing_indicator(
        &self,
        recipient_id: &UserId,
        sender_id: &UserId,
        conversation_id: &ConversationId,
        is_typing: bool,
    ) -> Result<(), DeliveryError>;

    /// Check whether the user has at least one live connection.
    async fn is_user_online(&self, user_id: &UserId) -> bool;
}
