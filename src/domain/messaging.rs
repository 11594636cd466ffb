//! Chat message entities pushed to connected clients.
//!
//! Message content is end-to-end encrypted by the clients; this crate
//! treats `encrypted_content` and `nonce` as opaque strings and never
//! inspects them. Persistence and decryption both happen elsewhere.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::foundation::{ConversationId, MessageId, Timestamp, UserId};

/// Broad category of an attachment, derived from its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentCategory {
    Image,
    Video,
    Audio,
    Document,
}

/// Metadata for a file attached to a chat message.
///
/// The file bytes live in blob storage; only the metadata travels over
/// the push channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageAttachment {
    /// Unique identifier of the attachment record.
    pub id: Uuid,

    /// Server-side file name (storage key derived).
    pub file_name: String,

    /// File name as uploaded by the client.
    pub original_name: String,

    /// MIME content type.
    pub content_type: String,

    /// Size in bytes.
    pub file_size: u64,

    /// Broad category for client rendering.
    pub file_category: AttachmentCategory,

    /// Pixel width, for images and video.
    pub width: Option<u32>,

    /// Pixel height, for images and video.
    pub height: Option<u32>,

    /// Download URL resolved by the caller before pushing.
    pub url: Option<String>,
}

/// An already-persisted chat message destined for a recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique identifier of the stored message.
    pub id: MessageId,

    /// Conversation the message belongs to.
    pub conversation_id: ConversationId,

    /// Verified author of the message.
    pub sender_id: UserId,

    /// Author display name at send time.
    pub sender_username: String,

    /// Ciphertext; opaque to the gateway.
    pub encrypted_content: String,

    /// Encryption nonce; opaque to the gateway.
    pub nonce: String,

    /// Key the sender encrypted with, when using asymmetric exchange.
    pub sender_public_key_id: Option<Uuid>,

    /// When the message was created.
    pub created_at: Timestamp,

    /// Attachment metadata, empty for text-only messages.
    pub attachments: Vec<MessageAttachment>,
}

impl ChatMessage {
    /// Creates a message with no attachments.
    pub fn new(
        conversation_id: ConversationId,
        sender_id: UserId,
        sender_username: impl Into<String>,
        encrypted_content: impl Into<String>,
        nonce: impl Into<String>,
    ) -> Self {
        Self {
            id: MessageId::new(),
            conversation_id,
            sender_id,
            sender_username: sender_username.into(),
            encrypted_content: encrypted_content.into(),
            nonce: nonce.into(),
            sender_public_key_id: None,
            created_at: Timestamp::now(),
            attachments: Vec::new(),
        }
    }

    /// Sets the sender public key reference.
    pub fn with_sender_public_key(mut self, key_id: Uuid) -> Self {
        self.sender_public_key_id = Some(key_id);
        self
    }

    /// Appends attachment metadata.
    pub fn with_attachment(mut self, attachment: MessageAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}
