//! Anonymous session lifecycle: create, look up, transfer to an account,
//! and conversion metrics.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::chat::handlers::find_chat_by_id;
use crate::errors::AppError;
use crate::models::session::ChatSessionRow;
use crate::resume::handlers::{apply_bulk_update, find_by_user, find_or_create, UpdateResumeRequest};
use crate::state::AppState;

pub const SESSION_TTL_HOURS: i64 = 24;
const DEFAULT_SOURCE: &str = "web";

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub message: &'static str,
}

/// Public view of an active session.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: Uuid,
    pub is_anonymous: bool,
    pub chat_id: Option<Uuid>,
    pub expires_at: DateTime<Utc>,
    pub source: String,
}

impl From<ChatSessionRow> for SessionView {
    fn from(row: ChatSessionRow) -> Self {
        Self {
            session_id: row.session_id,
            is_anonymous: row.is_anonymous,
            chat_id: row.chat_id,
            expires_at: row.expires_at,
            source: row.source,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct TransferSessionRequest {
    #[serde(rename = "sessionId")]
    pub session_id: String,
}

#[derive(Debug, Serialize)]
pub struct TransferSessionResponse {
    #[serde(rename = "chatId")]
    pub chat_id: Option<Uuid>,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionMetrics {
    pub total_anonymous_sessions: i64,
    pub total_converted_sessions: i64,
    pub conversion_rate: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Shared lookups
// ────────────────────────────────────────────────────────────────────────────

async fn find_by_session_id(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<Option<ChatSessionRow>, AppError> {
    let session =
        sqlx::query_as::<_, ChatSessionRow>("SELECT * FROM chat_sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(pool)
            .await?;
    Ok(session)
}

/// A session is active while its TTL has not elapsed, transferred or not.
async fn find_active_session(
    pool: &PgPool,
    session_id: Uuid,
) -> Result<ChatSessionRow, AppError> {
    sqlx::query_as::<_, ChatSessionRow>(
        "SELECT * FROM chat_sessions WHERE session_id = $1 AND expires_at >= NOW()",
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?
    .ok_or_else(|| AppError::NotFound("Session not found or expired".into()))
}

/// Stores parsed résumé data on an active session. `original_resume_data`
/// is left untouched.
pub(crate) async fn update_session_data(
    pool: &PgPool,
    session_id: Uuid,
    resume_data: &Value,
) -> Result<(), AppError> {
    find_active_session(pool, session_id).await?;
    sqlx::query(
        "UPDATE chat_sessions SET resume_data = $1, updated_at = NOW() WHERE session_id = $2",
    )
    .bind(resume_data)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

/// Remembers which chat an anonymous session spawned, so a later transfer
/// can hand the chat to the new account.
pub(crate) async fn link_chat_to_session(
    pool: &PgPool,
    session_id: Uuid,
    chat_id: Uuid,
) -> Result<(), AppError> {
    sqlx::query("UPDATE chat_sessions SET chat_id = $1, updated_at = NOW() WHERE session_id = $2")
        .bind(chat_id)
        .bind(session_id)
        .execute(pool)
        .await?;
    Ok(())
}

async fn mark_converted(pool: &PgPool, session_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    sqlx::query(
        "UPDATE chat_sessions
            SET user_id = $1, is_anonymous = FALSE, converted_at = NOW(), updated_at = NOW()
          WHERE session_id = $2",
    )
    .bind(user_id)
    .bind(session_id)
    .execute(pool)
    .await?;
    Ok(())
}

fn effective_source(source: Option<String>) -> String {
    source
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| DEFAULT_SOURCE.to_string())
}

fn conversion_rate(total_anonymous: i64, total_converted: i64) -> String {
    let rate = if total_anonymous > 0 {
        total_converted as f64 / total_anonymous as f64 * 100.0
    } else {
        0.0
    };
    format!("{rate:.2}%")
}

// ────────────────────────────────────────────────────────────────────────────
// Résumé import on transfer
// ────────────────────────────────────────────────────────────────────────────

// Keys produced by the résumé parser on the left, stored item keys on the
// right. Languages are the only section whose keys differ.
const EXPERIENCE_FIELDS: &[(&str, &str)] = &[
    ("position", "position"),
    ("company", "company"),
    ("startDate", "startDate"),
    ("endDate", "endDate"),
    ("current", "current"),
    ("description", "description"),
];
const SKILL_FIELDS: &[(&str, &str)] = &[("name", "name"), ("level", "level")];
const LANGUAGE_FIELDS: &[(&str, &str)] = &[("language", "name"), ("proficiency", "level")];
const EDUCATION_FIELDS: &[(&str, &str)] = &[
    ("degree", "degree"),
    ("institution", "institution"),
    ("startDate", "startDate"),
    ("endDate", "endDate"),
    ("current", "current"),
];
const CERTIFICATION_FIELDS: &[(&str, &str)] = &[
    ("name", "name"),
    ("institution", "institution"),
    ("completionDate", "completionDate"),
];

/// Projects one parsed section array onto the stored item keys, dropping
/// nulls and anything the field map does not name.
fn remap_items(items: Option<&Value>, fields: &[(&str, &str)]) -> Vec<Value> {
    let Some(array) = items.and_then(Value::as_array) else {
        return Vec::new();
    };
    array
        .iter()
        .map(|item| {
            let mut out = serde_json::Map::new();
            for (from, to) in fields {
                match item.get(*from) {
                    Some(v) if !v.is_null() => {
                        out.insert((*to).to_string(), v.clone());
                    }
                    _ => {}
                }
            }
            Value::Object(out)
        })
        .collect()
}

async fn import_profile_fields(
    pool: &PgPool,
    user_id: Uuid,
    data: &Value,
) -> Result<(), AppError> {
    let field = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    sqlx::query(
        "UPDATE users
            SET full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                cpf = COALESCE($4, cpf),
                city = COALESCE($5, city),
                state = COALESCE($6, state),
                linkedin = COALESCE($7, linkedin),
                professional_summary = COALESCE($8, professional_summary),
                updated_at = NOW()
          WHERE id = $1",
    )
    .bind(user_id)
    .bind(field("full_name"))
    .bind(field("phone"))
    .bind(field("cpf"))
    .bind(field("city"))
    .bind(field("state"))
    .bind(field("linkedin"))
    .bind(field("professional_summary"))
    .execute(pool)
    .await?;
    Ok(())
}

/// Moves the résumé parsed during the anonymous session into the new
/// account. Skipped when the user already built a résumé of their own.
async fn import_resume_data(pool: &PgPool, user_id: Uuid, data: &Value) -> Result<(), AppError> {
    if find_by_user(pool, user_id).await?.is_some() {
        tracing::info!(user_id = %user_id, "user already has a resume, skipping import");
        return Ok(());
    }

    import_profile_fields(pool, user_id, data).await?;
    find_or_create(pool, user_id).await?;

    let body = UpdateResumeRequest {
        experiences: Some(remap_items(data.get("experiences"), EXPERIENCE_FIELDS)),
        skills: Some(remap_items(data.get("skills"), SKILL_FIELDS)),
        languages: Some(remap_items(data.get("languages"), LANGUAGE_FIELDS)),
        educations: Some(remap_items(data.get("educations"), EDUCATION_FIELDS)),
        certifications: Some(remap_items(data.get("certifications"), CERTIFICATION_FIELDS)),
    };
    apply_bulk_update(pool, user_id, body).await?;

    tracing::info!(user_id = %user_id, "session resume data imported");
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions/anonymous
///
/// No authentication: this is the entry point for visitors. The body is
/// optional; `source` tags where the visitor came from.
pub async fn handle_create_session(
    State(state): State<AppState>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<(StatusCode, Json<SessionCreated>), AppError> {
    let source = effective_source(body.and_then(|Json(b)| b.source));

    let session = sqlx::query_as::<_, ChatSessionRow>(
        "INSERT INTO chat_sessions (id, session_id, source, expires_at)
         VALUES ($1, $2, $3, $4)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(Uuid::new_v4())
    .bind(source)
    .bind(Utc::now() + Duration::hours(SESSION_TTL_HOURS))
    .fetch_one(&state.db)
    .await?;

    tracing::info!(session_id = %session.session_id, source = %session.source, "anonymous session created");

    Ok((
        StatusCode::CREATED,
        Json(SessionCreated {
            session_id: session.session_id,
            expires_at: session.expires_at,
            message: "Anonymous session created successfully",
        }),
    ))
}

/// GET /api/v1/sessions/:sessionId
pub async fn handle_get_session(
    State(state): State<AppState>,
    Path(raw_session_id): Path<String>,
) -> Result<Json<SessionView>, AppError> {
    let session_id = Uuid::parse_str(&raw_session_id)
        .map_err(|_| AppError::NotFound("Session not found or expired".into()))?;
    let session = find_active_session(&state.db, session_id).await?;
    Ok(Json(session.into()))
}

/// POST /api/v1/sessions/transfer
///
/// Claims an anonymous session for the authenticated caller. Runs the
/// résumé import first (best effort), then hands over the linked chat if
/// there is one. A session can be claimed exactly once.
pub async fn handle_transfer_session(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<TransferSessionRequest>,
) -> Result<Json<TransferSessionResponse>, AppError> {
    let session_id = Uuid::parse_str(&body.session_id)
        .map_err(|_| AppError::NotFound("Session not found".into()))?;
    let response = transfer_session(&state.db, session_id, auth.user_id).await?;
    Ok(Json(response))
}

pub(crate) async fn transfer_session(
    pool: &PgPool,
    session_id: Uuid,
    user_id: Uuid,
) -> Result<TransferSessionResponse, AppError> {
    let session = find_by_session_id(pool, session_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Session not found".into()))?;

    if session.is_transferred() {
        return Err(AppError::Conflict("Session already transferred".into()));
    }
    if session.is_expired(Utc::now()) {
        return Err(AppError::Validation("Session expired".into()));
    }

    // A failed import never blocks the transfer.
    if let Some(data) = &session.resume_data {
        if let Err(e) = import_resume_data(pool, user_id, data).await {
            tracing::error!(user_id = %user_id, "resume import failed: {e}");
        }
    }

    if let Some(chat_id) = session.chat_id {
        find_chat_by_id(pool, chat_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Associated chat not found".into()))?;
        sqlx::query("UPDATE chats SET user_id = $1, updated_at = NOW() WHERE id = $2")
            .bind(user_id)
            .bind(chat_id)
            .execute(pool)
            .await?;
        mark_converted(pool, session_id, user_id).await?;
        tracing::info!(session_id = %session_id, user_id = %user_id, chat_id = %chat_id, "session transferred with chat");
        return Ok(TransferSessionResponse {
            chat_id: Some(chat_id),
            message: "Session transferred successfully",
        });
    }

    mark_converted(pool, session_id, user_id).await?;
    tracing::info!(session_id = %session_id, user_id = %user_id, "session transferred");
    Ok(TransferSessionResponse {
        chat_id: None,
        message: "Session transferred. The chat will be created on the next interaction.",
    })
}

/// GET /api/v1/sessions/metrics/conversion
pub async fn handle_conversion_metrics(
    State(state): State<AppState>,
) -> Result<Json<ConversionMetrics>, AppError> {
    let total_anonymous = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM chat_sessions WHERE is_anonymous = TRUE AND user_id IS NULL",
    )
    .fetch_one(&state.db)
    .await?;
    let total_converted = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM chat_sessions WHERE is_anonymous = FALSE AND converted_at IS NOT NULL",
    )
    .fetch_one(&state.db)
    .await?;

    Ok(Json(ConversionMetrics {
        total_anonymous_sessions: total_anonymous,
        total_converted_sessions: total_converted,
        conversion_rate: conversion_rate(total_anonymous, total_converted),
    }))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_source_defaults_to_web() {
        assert_eq!(effective_source(None), "web");
        assert_eq!(effective_source(Some("".into())), "web");
        assert_eq!(effective_source(Some("   ".into())), "web");
    }

    #[test]
    fn test_source_is_trimmed_and_kept() {
        assert_eq!(effective_source(Some(" landing-page ".into())), "landing-page");
    }

    #[test]
    fn test_conversion_rate_with_no_sessions_is_zero() {
        assert_eq!(conversion_rate(0, 0), "0.00%");
    }

    #[test]
    fn test_conversion_rate_rounds_to_two_decimals() {
        assert_eq!(conversion_rate(3, 1), "33.33%");
        assert_eq!(conversion_rate(2, 1), "50.00%");
        assert_eq!(conversion_rate(4, 4), "100.00%");
    }

    #[test]
    fn test_remap_renames_language_keys() {
        let data = json!([{ "language": "English", "proficiency": "fluent" }]);
        let out = remap_items(Some(&data), LANGUAGE_FIELDS);
        assert_eq!(out, vec![json!({ "name": "English", "level": "fluent" })]);
    }

    #[test]
    fn test_remap_drops_nulls_and_unknown_keys() {
        let data = json!([{
            "name": "Rust",
            "level": null,
            "yearsOfExperience": 5
        }]);
        let out = remap_items(Some(&data), SKILL_FIELDS);
        assert_eq!(out, vec![json!({ "name": "Rust" })]);
    }

    #[test]
    fn test_remap_missing_section_yields_empty() {
        assert!(remap_items(None, SKILL_FIELDS).is_empty());
        assert!(remap_items(Some(&json!("not an array")), SKILL_FIELDS).is_empty());
    }

    #[test]
    fn test_remap_keeps_experience_shape() {
        let data = json!([{
            "position": "Engineer",
            "company": "Acme",
            "startDate": "2020-01-01",
            "current": true
        }]);
        let out = remap_items(Some(&data), EXPERIENCE_FIELDS);
        assert_eq!(
            out,
            vec![json!({
                "position": "Engineer",
                "company": "Acme",
                "startDate": "2020-01-01",
                "current": true
            })]
        );
    }

    #[test]
    fn test_transfer_response_serializes_null_chat_id() {
        let response = TransferSessionResponse {
            chat_id: None,
            message: "Session transferred. The chat will be created on the next interaction.",
        };
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["chatId"].is_null());
    }
}
