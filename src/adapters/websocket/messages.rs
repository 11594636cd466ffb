//! WebSocket wire protocol for the push channel.
//!
//! Every frame is a JSON text envelope:
//!
//! ```text
//! {"type": "<tag>", "payload": {...}, "timestamp": "<RFC3339>"}
//! ```
//!
//! The payload shape depends on the type tag and is decoded only after
//! the tag is known; `ping` and `pong` omit the payload entirely.
//!
//! # Security
//!
//! Trust-bearing payload fields (the user identity on lock events and
//! typing indicators) are overwritten server-side from the verified
//! connection identity before relay. Deserialized client values for
//! those fields are never forwarded.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::foundation::{ConversationId, MessageId, NotificationId, Timestamp, UserId};
use crate::domain::messaging::AttachmentCategory;
use crate::domain::{ChatMessage, Notification, NotificationPriority, NotificationType};

// ============================================
// Envelope
// ============================================

/// Discriminator carried in every envelope's `type` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Notification,
    DashboardUpdate,
    RecordLock,
    RecordUnlock,
    Presence,
    ChatMessage,
    TypingIndicator,
    Ping,
    Pong,
}

/// A typed wire message wrapping a type-specific payload.
///
/// Immutable once constructed: created, serialized, possibly dropped
/// on a full queue, and discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Type tag selecting the payload shape.
    #[serde(rename = "type")]
    pub message_type: MessageType,

    /// Type-specific payload; absent for `ping`/`pong`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,

    /// When the envelope was constructed, RFC3339 on the wire.
    ///
    /// Tolerated as missing on inbound frames; clients are not all
    /// diligent about stamping their pings.
    #[serde(default)]
    pub timestamp: Timestamp,
}

/// Errors raised while reading a payload out of an envelope.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Envelope of type {0:?} carries no payload")]
    MissingPayload(MessageType),

    #[error("Malformed payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

impl Envelope {
    /// Creates a payload-less envelope (`ping`/`pong`).
    pub fn bare(message_type: MessageType) -> Self {
        Self {
            message_type,
            payload: None,
            timestamp: Timestamp::now(),
        }
    }

    /// Creates an envelope carrying a typed payload.
    ///
    /// # Errors
    ///
    /// Returns the serialization error when the payload cannot be
    /// represented as JSON; callers abort only that send.
    pub fn with_payload<P: Serialize>(
        message_type: MessageType,
        payload: &P,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            message_type,
            payload: Some(serde_json::to_value(payload)?),
            timestamp: Timestamp::now(),
        })
    }

    /// Decodes the payload as the given type.
    ///
    /// The caller is expected to have matched on `message_type` first.
    pub fn payload_as<P: DeserializeOwned>(&self) -> Result<P, ProtocolError> {
        let value = self
            .payload
            .as_ref()
            .ok_or(ProtocolError::MissingPayload(self.message_type))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}

// ============================================
// Payload Types
// ============================================

/// Payload for `notification` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub priority: NotificationPriority,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<std::collections::HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_name: Option<String>,
    pub created_at: Timestamp,
}

impl From<&Notification> for NotificationPayload {
    fn from(n: &Notification) -> Self {
        Self {
            id: n.id,
            user_id: n.user_id.clone(),
            title: n.title.clone(),
            message: n.message.clone(),
            notification_type: n.notification_type,
            priority: n.priority,
            action_url: n.action_url.clone(),
            reference_type: n.reference_type.clone(),
            reference_id: n.reference_id.clone(),
            metadata: n.metadata.clone(),
            sender_name: n.sender_name.clone(),
            created_at: n.created_at,
        }
    }
}

/// Payload for `dashboard_update` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardUpdatePayload {
    /// Count of distinct users with at least one open connection in
    /// the company.
    pub online_users: usize,
}

/// Payload for `record_lock` and `record_unlock` envelopes.
///
/// `user_id` and `user_email` are stamped server-side; inbound values
/// default to empty and are discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordLockPayload {
    pub entity_type: String,
    pub entity_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub user_email: String,
}

/// Payload for `presence` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PresencePayload {
    pub user_id: UserId,
    pub user_email: String,
    pub online: bool,
}

/// Payload for `chat_message` envelopes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessagePayload {
    pub message_id: MessageId,
    pub conversation_id: ConversationId,
    pub sender_id: UserId,
    pub sender_username: String,
    pub encrypted_content: String,
    pub nonce: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_public_key_id: Option<uuid::Uuid>,
    pub created_at: Timestamp,
    pub attachments: Vec<AttachmentPayload>,
}

/// Attachment metadata carried inside a `chat_message` payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentPayload {
    pub id: uuid::Uuid,
    pub file_name: String,
    pub original_name: String,
    pub content_type: String,
    pub file_size: u64,
    pub file_category: AttachmentCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl From<&ChatMessage> for ChatMessagePayload {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            message_id: msg.id,
            conversation_id: msg.conversation_id,
            sender_id: msg.sender_id.clone(),
            sender_username: msg.sender_username.clone(),
            encrypted_content: msg.encrypted_content.clone(),
            nonce: msg.nonce.clone(),
            sender_public_key_id: msg.sender_public_key_id,
            created_at: msg.created_at,
            attachments: msg
                .attachments
                .iter()
                .map(|a| AttachmentPayload {
                    id: a.id,
                    file_name: a.file_name.clone(),
                    original_name: a.original_name.clone(),
                    content_type: a.content_type.clone(),
                    file_size: a.file_size,
                    file_category: a.file_category,
                    width: a.width,
                    height: a.height,
                    url: a.url.clone(),
                })
                .collect(),
        }
    }
}

/// Payload for `typing_indicator` envelopes.
///
/// `user_id` is stamped server-side; the inbound value defaults to
/// empty and is discarded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypingIndicatorPayload {
    pub conversation_id: ConversationId,
    #[serde(default)]
    pub user_id: String,
    pub is_typing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::UserId;

    #[test]
    fn envelope_serializes_with_type_tag_and_timestamp() {
        let envelope = Envelope::with_payload(
            MessageType::DashboardUpdate,
            &DashboardUpdatePayload { online_users: 3 },
        )
        .unwrap();

        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""type":"dashboard_update""#));
        assert!(json.contains(r#""online_users":3"#));
        assert!(json.contains(r#""timestamp":"#));
    }

    #[test]
    fn bare_envelope_omits_payload() {
        let envelope = Envelope::bare(MessageType::Ping);
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains(r#""type":"ping""#));
        assert!(!json.contains("payload"));
    }

    #[test]
    fn envelope_deserializes_client_ping() {
        let json = r#"{"type": "ping", "timestamp": "2025-01-10T00:00:00Z"}"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.message_type, MessageType::Ping);
        assert!(envelope.payload.is_none());
    }

    #[test]
    fn envelope_decodes_lock_payload_after_tag_match() {
        let json = r#"{
            "type": "record_lock",
            "payload": {"entity_type": "invoice", "entity_id": "42"},
            "timestamp": "2025-01-10T00:00:00Z"
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        assert_eq!(envelope.message_type, MessageType::RecordLock);

        let payload: RecordLockPayload = envelope.payload_as().unwrap();
        assert_eq!(payload.entity_type, "invoice");
        assert_eq!(payload.entity_id, "42");
        // Client-side identity fields default to empty and get stamped later.
        assert!(payload.user_id.is_empty());
    }

    #[test]
    fn payload_as_fails_on_missing_payload() {
        let envelope = Envelope::bare(MessageType::RecordLock);
        let result: Result<RecordLockPayload, _> = envelope.payload_as();
        assert!(matches!(result, Err(ProtocolError::MissingPayload(_))));
    }

    #[test]
    fn payload_as_fails_on_shape_mismatch() {
        let json = r#"{
            "type": "typing_indicator",
            "payload": {"conversation_id": "not-a-uuid", "is_typing": true},
            "timestamp": "2025-01-10T00:00:00Z"
        }"#;
        let envelope: Envelope = serde_json::from_str(json).unwrap();
        let result: Result<TypingIndicatorPayload, _> = envelope.payload_as();
        assert!(matches!(result, Err(ProtocolError::MalformedPayload(_))));
    }

    #[test]
    fn notification_payload_maps_entity_fields() {
        let user = UserId::new("user-1").unwrap();
        let notification = Notification::new(
            user.clone(),
            "Invoice approved",
            "Invoice INV-42 was approved",
            NotificationType::Approval,
        )
        .with_priority(NotificationPriority::High)
        .with_reference("invoice", "42");

        let payload = NotificationPayload::from(&notification);
        assert_eq!(payload.user_id, user);
        assert_eq!(payload.notification_type, NotificationType::Approval);
        assert_eq!(payload.reference_id.as_deref(), Some("42"));

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains(r#""type":"approval""#));
        assert!(json.contains(r#""priority":"high""#));
        // Unset optionals stay off the wire entirely.
        assert!(!json.contains("action_url"));
    }

    #[test]
    fn chat_message_payload_maps_attachments() {
        use crate::domain::messaging::MessageAttachment;
        use crate::domain::ChatMessage;
        use crate::domain::foundation::ConversationId;

        let msg = ChatMessage::new(
            ConversationId::new(),
            UserId::new("sender-1").unwrap(),
            "alice",
            "ciphertext",
            "nonce",
        )
        .with_attachment(MessageAttachment {
            id: uuid::Uuid::new_v4(),
            file_name: "abc.png".to_string(),
            original_name: "photo.png".to_string(),
            content_type: "image/png".to_string(),
            file_size: 1024,
            file_category: AttachmentCategory::Image,
            width: Some(100),
            height: Some(100),
            url: None,
        });

        let payload = ChatMessagePayload::from(&msg);
        assert_eq!(payload.attachments.len(), 1);
        assert_eq!(payload.attachments[0].original_name, "photo.png");
        assert_eq!(payload.encrypted_content, "ciphertext");
    }

    #[test]
    fn typing_payload_defaults_client_identity_to_empty() {
        let json = format!(
            r#"{{"conversation_id": "{}", "user_id": "spoofed-user", "is_typing": true}}"#,
            ConversationId::new()
        );
        let payload: TypingIndicatorPayload = serde_json::from_str(&json).unwrap();
        // Deserialization keeps the value, stamping replaces it before relay.
        assert_eq!(payload.user_id, "spoofed-user");

        let without_identity = format!(
            r#"{{"conversation_id": "{}", "is_typing": false}}"#,
            ConversationId::new()
        );
        let payload: TypingIndicatorPayload = serde_json::from_str(&without_identity).unwrap();
        assert!(payload.user_id.is_empty());
    }

    #[test]
    fn message_type_round_trips_all_tags() {
        for (tag, message_type) in [
            ("notification", MessageType::Notification),
            ("dashboard_update", MessageType::DashboardUpdate),
            ("record_lock", MessageType::RecordLock),
            ("record_unlock", MessageType::RecordUnlock),
            ("presence", MessageType::Presence),
            ("chat_message", MessageType::ChatMessage),
            ("typing_indicator", MessageType::TypingIndicator),
            ("ping", MessageType::Ping),
            ("pong", MessageType::Pong),
        ] {
            let json = format!("\"{}\"", tag);
            let parsed: MessageType = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, message_type);
            assert_eq!(serde_json::to_string(&message_type).unwrap(), json);
        }
    }
}
