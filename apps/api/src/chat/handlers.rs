//! Axum route handlers for chat CRUD, message listing and message search.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::AppError;
use crate::models::chat::{ChatRow, ChatSummary, MessageRow, MessageView, DEFAULT_CHAT_TITLE};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateChatRequest {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateChatTitleRequest {
    pub title: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchMessagesRequest {
    pub query: String,
}

/// Chat as returned by the CRUD endpoints. The message preview is only
/// populated by the list endpoint; create/get/rename return it null.
#[derive(Debug, Serialize)]
pub struct ChatView {
    pub id: Uuid,
    pub title: String,
    #[serde(rename = "lastMessage")]
    pub last_message: Option<String>,
}

impl From<ChatRow> for ChatView {
    fn from(row: ChatRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            last_message: None,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared lookups
// ────────────────────────────────────────────────────────────────────────────

/// Fetches a chat by id, skipping soft-deleted rows.
pub(crate) async fn find_chat_by_id(
    pool: &PgPool,
    chat_id: Uuid,
) -> Result<Option<ChatRow>, AppError> {
    let chat = sqlx::query_as::<_, ChatRow>("SELECT * FROM chats WHERE id = $1 AND deleted_at IS NULL")
        .bind(chat_id)
        .fetch_optional(pool)
        .await?;
    Ok(chat)
}

/// A chat is accessible to its owner; ownerless chats only to anonymous
/// callers.
pub(crate) fn chat_accessible(chat: &ChatRow, user_id: Option<Uuid>) -> bool {
    match user_id {
        Some(id) => chat.user_id == Some(id),
        None => chat.user_id.is_none(),
    }
}

/// Loads a chat and enforces ownership: 404 when missing or soft-deleted,
/// 403 when it belongs to someone else.
pub(crate) async fn ensure_chat_access(
    pool: &PgPool,
    chat_id: Uuid,
    user_id: Option<Uuid>,
) -> Result<ChatRow, AppError> {
    let chat = find_chat_by_id(pool, chat_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Chat not found".into()))?;
    if !chat_accessible(&chat, user_id) {
        return Err(AppError::Forbidden("Access to this chat denied".into()));
    }
    Ok(chat)
}

pub(crate) async fn insert_chat(
    pool: &PgPool,
    user_id: Option<Uuid>,
    title: Option<String>,
) -> Result<ChatRow, AppError> {
    let title = match title {
        Some(t) if !t.trim().is_empty() => t,
        _ => DEFAULT_CHAT_TITLE.to_string(),
    };
    validate_title(&title)?;
    let chat = sqlx::query_as::<_, ChatRow>(
        "INSERT INTO chats (id, user_id, title) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .bind(title)
    .fetch_one(pool)
    .await?;
    Ok(chat)
}

fn validate_title(title: &str) -> Result<(), AppError> {
    if title.trim().is_empty() {
        return Err(AppError::Validation("Title must not be empty".into()));
    }
    if title.chars().count() > 255 {
        return Err(AppError::Validation(
            "Title must be at most 255 characters".into(),
        ));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Chat CRUD
// ────────────────────────────────────────────────────────────────────────────

/// POST /chats
pub async fn handle_create_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateChatRequest>,
) -> Result<(StatusCode, Json<ChatView>), AppError> {
    let chat = insert_chat(&state.db, Some(auth.user_id), body.title).await?;
    tracing::info!(chat_id = %chat.id, user_id = %auth.user_id, "chat created");
    Ok((StatusCode::CREATED, Json(chat.into())))
}

/// GET /chats
pub async fn handle_list_chats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<Vec<ChatSummary>>, AppError> {
    let chats = sqlx::query_as::<_, ChatSummary>(
        r#"
        SELECT c.id, c.title,
               (SELECT m.content FROM messages m
                 WHERE m.chat_id = c.id
                 ORDER BY m.created_at DESC LIMIT 1) AS last_message
          FROM chats c
         WHERE c.user_id = $1 AND c.deleted_at IS NULL
         ORDER BY c.last_message_at DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(chats))
}

/// GET /chats/:id
pub async fn handle_get_chat(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<ChatView>, AppError> {
    let chat = ensure_chat_access(&state.db, chat_id, user_id).await?;
    Ok(Json(chat.into()))
}

/// PATCH /chats/:id/title
pub async fn handle_update_chat_title(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<Uuid>,
    Json(body): Json<UpdateChatTitleRequest>,
) -> Result<Json<ChatView>, AppError> {
    validate_title(&body.title)?;
    ensure_chat_access(&state.db, chat_id, Some(auth.user_id)).await?;
    let chat = sqlx::query_as::<_, ChatRow>(
        "UPDATE chats SET title = $1, updated_at = NOW() WHERE id = $2 RETURNING *",
    )
    .bind(body.title)
    .bind(chat_id)
    .fetch_one(&state.db)
    .await?;
    Ok(Json(chat.into()))
}

/// DELETE /chats/:id (soft delete)
pub async fn handle_delete_chat(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    ensure_chat_access(&state.db, chat_id, Some(auth.user_id)).await?;
    sqlx::query("UPDATE chats SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(chat_id)
        .execute(&state.db)
        .await?;
    tracing::info!(chat_id = %chat_id, "chat deleted");
    Ok(Json(json!({ "message": "Chat deleted successfully" })))
}

// ────────────────────────────────────────────────────────────────────────────
// Messages within a chat
// ────────────────────────────────────────────────────────────────────────────

/// GET /chats/:id/messages
pub async fn handle_list_messages(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
    Path(chat_id): Path<Uuid>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    ensure_chat_access(&state.db, chat_id, user_id).await?;
    let messages = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE chat_id = $1 ORDER BY created_at ASC",
    )
    .bind(chat_id)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(messages.into_iter().map(MessageView::from).collect()))
}

/// POST /chats/:id/messages/search
pub async fn handle_search_messages(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(chat_id): Path<Uuid>,
    Json(body): Json<SearchMessagesRequest>,
) -> Result<Json<Vec<MessageView>>, AppError> {
    if body.query.trim().is_empty() {
        return Err(AppError::Validation("Search query must not be empty".into()));
    }
    ensure_chat_access(&state.db, chat_id, Some(auth.user_id)).await?;
    let pattern = format!("%{}%", escape_like(&body.query));
    let messages = sqlx::query_as::<_, MessageRow>(
        "SELECT * FROM messages WHERE chat_id = $1 AND content ILIKE $2 ORDER BY created_at ASC",
    )
    .bind(chat_id)
    .bind(pattern)
    .fetch_all(&state.db)
    .await?;
    Ok(Json(messages.into_iter().map(MessageView::from).collect()))
}

/// Escapes LIKE metacharacters so user input matches literally.
fn escape_like(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_chat(user_id: Option<Uuid>) -> ChatRow {
        ChatRow {
            id: Uuid::new_v4(),
            user_id,
            title: DEFAULT_CHAT_TITLE.to_string(),
            message_count: 0,
            last_message_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn test_owner_can_access_own_chat() {
        let owner = Uuid::new_v4();
        let chat = make_chat(Some(owner));
        assert!(chat_accessible(&chat, Some(owner)));
    }

    #[test]
    fn test_foreign_user_cannot_access_chat() {
        let chat = make_chat(Some(Uuid::new_v4()));
        assert!(!chat_accessible(&chat, Some(Uuid::new_v4())));
    }

    #[test]
    fn test_anonymous_can_access_only_ownerless_chats() {
        assert!(chat_accessible(&make_chat(None), None));
        assert!(!chat_accessible(&make_chat(Some(Uuid::new_v4())), None));
    }

    #[test]
    fn test_authed_user_cannot_access_anonymous_chat() {
        let chat = make_chat(None);
        assert!(!chat_accessible(&chat, Some(Uuid::new_v4())));
    }

    #[test]
    fn test_title_length_is_capped_at_255_chars() {
        assert!(validate_title(&"a".repeat(255)).is_ok());
        assert!(validate_title(&"a".repeat(256)).is_err());
        // multi-byte chars count as one
        assert!(validate_title(&"é".repeat(255)).is_ok());
    }

    #[test]
    fn test_blank_title_is_rejected() {
        assert!(validate_title("   ").is_err());
    }

    #[test]
    fn test_escape_like_neutralizes_metacharacters() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn test_chat_view_hides_preview() {
        let chat = make_chat(None);
        let view = ChatView::from(chat.clone());
        assert_eq!(view.id, chat.id);
        assert_eq!(view.title, chat.title);
        assert!(view.last_message.is_none());
    }
}
