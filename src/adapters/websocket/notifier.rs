//! Notifier adapter - pushes persisted notifications over the hub.
//!
//! Implements the `RealtimeNotifier` port. The notification module
//! stores its records first and then hands them here; this adapter
//! only mirrors them onto live connections. No retry, no queuing, no
//! acknowledgment. The durable record is the system of record when
//! the recipient is offline.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::UserId;
use crate::domain::Notification;
use crate::ports::{DeliveryError, RealtimeNotifier};

use super::hub::Hub;
use super::messages::{Envelope, MessageType, NotificationPayload};

/// Best-effort notification push over the WebSocket hub.
pub struct WebSocketNotifier {
    hub: Arc<Hub>,
}

impl WebSocketNotifier {
    /// Create a notifier backed by the given hub.
    pub fn new(hub: Arc<Hub>) -> Self {
        Self { hub }
    }
}

#[async_trait]
impl RealtimeNotifier for WebSocketNotifier {
    async fn notify_user(&self, notification: &Notification) -> Result<(), DeliveryError> {
        let payload = NotificationPayload::from(notification);
        let envelope = Envelope::with_payload(MessageType::Notification, &payload)
            .map_err(|error| {
                tracing::warn!(%error, notification_id = %notification.id, "failed to encode notification");
                DeliveryError::Encode(error.to_string())
            })?;

        self.hub.send_to_user(&notification.user_id, &envelope).await;
        Ok(())
    }

    async fn is_user_online(&self, user_id: &UserId) -> bool {
        self.hub.is_user_online(user_id).await
    }
}
