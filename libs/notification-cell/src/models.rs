use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub const NOTIFICATION_EVENT: &str = "notification";
pub const DEFAULT_INBOX_LIMIT: usize = 50;

/// A persisted inbox entry. Only `read` ever changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub read: bool,
    #[serde(default)]
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(user_id: Uuid, title: &str, message: &str, data: Option<Value>) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            title: title.to_string(),
            message: message.to_string(),
            read: false,
            data: data.unwrap_or_else(|| Value::Object(Default::default())),
            created_at: Utc::now(),
        }
    }

    pub fn push_payload(&self) -> Value {
        serde_json::json!({
            "id": self.id,
            "title": self.title,
            "message": self.message,
            "data": self.data,
            "created_at": self.created_at,
        })
    }
}

/// Frame written to a connected client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PushMessage {
    pub event: String,
    pub payload: Value,
    pub sent_at: DateTime<Utc>,
}

/// Outcome of one fan-out call. Neither channel failing is an error for the caller.
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub notification: Option<Notification>,
    pub pushed: bool,
}

impl DeliveryReport {
    pub fn persisted(&self) -> bool {
        self.notification.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxQuery {
    pub unread: Option<bool>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebSocketQuery {
    pub token: String,
}
