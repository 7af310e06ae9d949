//! Message creation, plus the chat/AI plumbing shared with the streaming
//! and upload endpoints.
//!
//! A message can target a chat id, the literal `"new"`, or no id at all; a
//! missing or inaccessible chat never fails here, the message simply lands
//! in a fresh chat owned by the caller.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::ai_client::ChatMessage;
use crate::auth::MaybeAuthUser;
use crate::chat::handlers::{chat_accessible, find_chat_by_id, insert_chat};
use crate::errors::AppError;
use crate::models::chat::{
    MessageRow, MESSAGE_TYPE_TEXT, ROLE_ASSISTANT, ROLE_USER,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateMessageRequest {
    pub content: String,
    /// "user" (default) or "assistant". Only user messages trigger a reply.
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
}

/// The persisted message plus the chat it landed in. `chatId` repeats
/// `chat_id` so clients that posted to "new" learn the created chat's id.
#[derive(Debug, Serialize)]
pub struct CreateMessageResponse {
    pub id: Uuid,
    pub chat_id: Uuid,
    #[serde(rename = "chatId")]
    pub effective_chat_id: Uuid,
    pub role: String,
    #[serde(rename = "messageType")]
    pub message_type: String,
    pub content: String,
    pub pdf_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl CreateMessageResponse {
    fn new(message: MessageRow, effective_chat_id: Uuid) -> Self {
        Self {
            id: message.id,
            chat_id: message.chat_id,
            effective_chat_id,
            role: message.role,
            message_type: message.message_type,
            content: message.content,
            pdf_url: message.pdf_url,
            created_at: message.created_at,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared plumbing
// ────────────────────────────────────────────────────────────────────────────

/// Path segment of the message routes: `"new"` or an empty segment means
/// "no chat yet", anything else must be a chat id.
pub(crate) fn parse_chat_id(raw: &str) -> Result<Option<Uuid>, AppError> {
    if raw.is_empty() || raw == "new" {
        return Ok(None);
    }
    Uuid::parse_str(raw)
        .map(Some)
        .map_err(|_| AppError::Validation("Invalid chat id".into()))
}

pub(crate) fn normalize_role(role: Option<String>) -> Result<String, AppError> {
    match role.as_deref() {
        None => Ok(ROLE_USER.to_string()),
        Some(r) if r == ROLE_USER || r == ROLE_ASSISTANT => Ok(r.to_string()),
        Some(other) => Err(AppError::Validation(format!(
            "Invalid role \"{other}\": expected \"user\" or \"assistant\""
        ))),
    }
}

/// Finds the target chat for an incoming message. A missing or foreign chat
/// is not an error: the message lands in a fresh chat owned by the caller.
pub(crate) async fn resolve_or_create_chat(
    pool: &PgPool,
    chat_id: Option<Uuid>,
    user_id: Option<Uuid>,
) -> Result<Uuid, AppError> {
    if let Some(id) = chat_id {
        if let Some(chat) = find_chat_by_id(pool, id).await? {
            if chat_accessible(&chat, user_id) {
                return Ok(chat.id);
            }
        }
        tracing::debug!(chat_id = %id, "target chat unavailable, creating a new one");
    }
    let chat = insert_chat(pool, user_id, None).await?;
    Ok(chat.id)
}

pub(crate) async fn insert_message(
    pool: &PgPool,
    chat_id: Uuid,
    role: &str,
    message_type: &str,
    content: &str,
    pdf_url: Option<&str>,
) -> Result<MessageRow, AppError> {
    let row = sqlx::query_as::<_, MessageRow>(
        r#"
        INSERT INTO messages (id, chat_id, role, message_type, content, pdf_url)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(chat_id)
    .bind(role)
    .bind(message_type)
    .bind(content)
    .bind(pdf_url)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Called once per persisted message so `message_count` stays accurate.
pub(crate) async fn bump_chat_metadata(pool: &PgPool, chat_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        r#"
        UPDATE chats
           SET message_count = message_count + 1,
               last_message_at = NOW(),
               updated_at = NOW()
         WHERE id = $1
        "#,
    )
    .bind(chat_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Full chat history in the wire shape the AI service consumes, oldest first.
pub(crate) async fn load_history(
    pool: &PgPool,
    chat_id: Uuid,
) -> Result<Vec<ChatMessage>, AppError> {
    let rows = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE chat_id = $1 ORDER BY created_at ASC",
    )
    .bind(chat_id)
    .fetch_all(pool)
    .await?;
    Ok(rows
        .into_iter()
        .map(|m| {
            if m.role == ROLE_ASSISTANT {
                ChatMessage::assistant(m.content)
            } else {
                ChatMessage::user(m.content)
            }
        })
        .collect())
}

/// Requests a completion over the chat's history and persists the reply as
/// an assistant message.
pub(crate) async fn process_assistant_response(
    state: &AppState,
    chat_id: Uuid,
    user_id: Option<Uuid>,
) -> Result<(), AppError> {
    let history = load_history(&state.db, chat_id).await?;
    let completion = state
        .ai
        .chat_completion(&history, user_id)
        .await
        .map_err(|e| AppError::Ai(format!("Failed to generate assistant response: {e}")))?;

    let pdf_url = completion
        .pdf_url
        .as_deref()
        .map(|path| state.ai.absolute_url(path));

    insert_message(
        &state.db,
        chat_id,
        ROLE_ASSISTANT,
        MESSAGE_TYPE_TEXT,
        &completion.content,
        pdf_url.as_deref(),
    )
    .await?;
    bump_chat_metadata(&state.db, chat_id).await?;
    Ok(())
}

async fn create_message(
    state: &AppState,
    chat_id: Option<Uuid>,
    user_id: Option<Uuid>,
    body: CreateMessageRequest,
) -> Result<CreateMessageResponse, AppError> {
    let role = normalize_role(body.role)?;
    let effective_chat_id = resolve_or_create_chat(&state.db, chat_id, user_id).await?;

    let message = insert_message(
        &state.db,
        effective_chat_id,
        &role,
        MESSAGE_TYPE_TEXT,
        &body.content,
        body.pdf_url.as_deref(),
    )
    .await?;

    if role == ROLE_USER {
        process_assistant_response(state, effective_chat_id, user_id).await?;
    }

    bump_chat_metadata(&state.db, effective_chat_id).await?;

    Ok(CreateMessageResponse::new(message, effective_chat_id))
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /chats/messages (no chat yet; one is created)
pub async fn handle_create_message_new(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Json(body): Json<CreateMessageRequest>,
) -> Result<Json<CreateMessageResponse>, AppError> {
    let response = create_message(&state, None, user_id, body).await?;
    Ok(Json(response))
}

/// POST /chats/:id/messages
pub async fn handle_create_message(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Path(raw_chat_id): Path<String>,
    Json(body): Json<CreateMessageRequest>,
) -> Result<Json<CreateMessageResponse>, AppError> {
    let chat_id = parse_chat_id(&raw_chat_id)?;
    let response = create_message(&state, chat_id, user_id, body).await?;
    Ok(Json(response))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_id_treats_new_as_absent() {
        assert_eq!(parse_chat_id("new").unwrap(), None);
        assert_eq!(parse_chat_id("").unwrap(), None);
    }

    #[test]
    fn test_parse_chat_id_accepts_valid_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_chat_id(&id.to_string()).unwrap(), Some(id));
    }

    #[test]
    fn test_parse_chat_id_rejects_garbage() {
        assert!(parse_chat_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_role_defaults_to_user() {
        assert_eq!(normalize_role(None).unwrap(), ROLE_USER);
    }

    #[test]
    fn test_role_accepts_user_and_assistant() {
        assert_eq!(normalize_role(Some("user".into())).unwrap(), ROLE_USER);
        assert_eq!(
            normalize_role(Some("assistant".into())).unwrap(),
            ROLE_ASSISTANT
        );
    }

    #[test]
    fn test_role_rejects_anything_else() {
        assert!(normalize_role(Some("system".into())).is_err());
        assert!(normalize_role(Some("USER".into())).is_err());
    }
}
