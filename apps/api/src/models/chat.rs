use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const ROLE_USER: &str = "user";
pub const ROLE_ASSISTANT: &str = "assistant";

pub const MESSAGE_TYPE_TEXT: &str = "text";
pub const MESSAGE_TYPE_PDF: &str = "pdf_attachment";

pub const DEFAULT_CHAT_TITLE: &str = "New Conversation";

/// A chat. `user_id` is NULL for anonymous chats; soft-deleted rows keep
/// `deleted_at` set and are excluded from all reads.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatRow {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub title: String,
    pub message_count: i32,
    pub last_message_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageRow {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: String,
    pub message_type: String,
    pub content: String,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Message as returned by the chat endpoints (the original API's mixed
/// casing is kept: `messageType` camelCase, the rest snake_case).
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: Uuid,
    pub chat_id: Uuid,
    pub role: String,
    #[serde(rename = "messageType")]
    pub message_type: String,
    pub content: String,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<MessageRow> for MessageView {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            chat_id: row.chat_id,
            role: row.role,
            message_type: row.message_type,
            content: row.content,
            pdf_url: row.pdf_url,
            created_at: row.created_at,
        }
    }
}

/// Chat list entry with a preview of the latest message.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ChatSummary {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<String>,
}
