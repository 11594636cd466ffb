//! Notification entity pushed to connected clients.
//!
//! Notifications are created and durably persisted by caller modules
//! (approvals, invoicing, mentions, ...) before they reach this crate.
//! The gateway only mirrors them onto live connections; the stored
//! record remains the system of record when no connection is open.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::foundation::{NotificationId, Timestamp, UserId};

/// Category of a notification, driving client-side rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Info,
    Success,
    Warning,
    Error,
    Approval,
    Mention,
    System,
}

/// Urgency of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
    Urgent,
}

/// An already-persisted notification destined for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier of the stored record.
    pub id: NotificationId,

    /// Recipient of the notification.
    pub user_id: UserId,

    /// Short headline shown in the notification list.
    pub title: String,

    /// Body text.
    pub message: String,

    /// Category of the notification.
    pub notification_type: NotificationType,

    /// Urgency of the notification.
    pub priority: NotificationPriority,

    /// Optional link the client navigates to on click.
    pub action_url: Option<String>,

    /// Optional reference to the entity the notification is about.
    pub reference_type: Option<String>,

    /// Identifier of the referenced entity.
    pub reference_id: Option<String>,

    /// Free-form metadata attached by the originating module.
    pub metadata: Option<HashMap<String, serde_json::Value>>,

    /// Display name of the user that triggered the notification.
    pub sender_name: Option<String>,

    /// When the record was created.
    pub created_at: Timestamp,
}

impl Notification {
    /// Creates a notification with default priority and no optional fields.
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        notification_type: NotificationType,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            user_id,
            title: title.into(),
            message: message.into(),
            notification_type,
            priority: NotificationPriority::Normal,
            action_url: None,
            reference_type: None,
            reference_id: None,
            metadata: None,
            sender_name: None,
            created_at: Timestamp::now(),
        }
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the action URL.
    pub fn with_action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }

    /// Sets the referenced entity.
    pub fn with_reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }

    /// Sets the sender display name.
    pub fn with_sender_name(mut self, name: impl Into<String>) -> Self {
        self.sender_name = Some(name.into());
        self
    }

    /// Adds a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata
            .get_or_insert_with(HashMap::new)
            .insert(key.into(), value);
        self
    }
}
