//! Chat messenger adapter - pushes chat traffic over the hub.
//!
//! Implements the `RealtimeMessenger` port. Message content arrives
//! already encrypted and already persisted; this adapter only mirrors
//! it to the recipient's live connections. The `is_user_online` query
//! lets the messaging module fall back to an out-of-band notification
//! when the recipient has no open connection.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{ConversationId, UserId};
use crate::domain::ChatMessage;
use crate::ports::{DeliveryError, RealtimeMessenger};

use super::hub::Hub;
use super::messages::{ChatMessagePayload, Envelope, MessageType, TypingIndicatorPayload};

/// Best-effort chat push over the WebSocket hub.
pub struct WebSocketMessenger {
    hub: Arc<Hub>,
}

impl WebSocketMessenger {
    /// Create a messenger backed by the given hub.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl RealtimeMessenger for WebSocketMessenger {
    async fn send_chat_message(
        &self,
        recipient_id: &UserId,
        message: &ChatMessage,
    ) -> Result<(), DeliveryError> {
        let payload = ChatMessagePayload::from(message);
        let envelope = Envelope::with_payload(MessageType::ChatMessage, &payload).map_err(
            |error| {
                tracing::warn!(%error, message_id = %message.id, "failed to encode chat message");
                DeliveryError::Encode(error.to_string())
            },
        )?;

        self.hub.send_to_user(recipient_id, &envelope).await;
        Ok(())
    }

    async fn send_typing_indicator(
        &self,
        recipient_id: &UserId,
        sender_id: &UserId,
        conversation_id: &ConversationId,
        is_typing: bool,
    ) -> Result<(), DeliveryError> {
        let payload = TypingIndicatorPayload {
            conversation_id: *conversation_id,
            user_id: sender_id.to_string(),
            is_typing,
        };
        let envelope = Envelope::with_payload(MessageType::TypingIndicator, &payload).map_err(
            |error| {
                tracing::warn!(%error, "failed to encode typing indicator");
                DeliveryError::Encode(error.to_string())
            },
        )?;

        self.hub.send_to_user(recipient_id, &envelope).await;
        Ok(())
    }

    async fn is_user_online(&self, user_id: &UserId) -> bool {
        self.hub.is_user_online(user_id).await
    }
}
