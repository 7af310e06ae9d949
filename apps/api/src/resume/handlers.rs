//! Axum route handlers for the résumé API.

use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::resume::{
    Certification, Education, Experience, Language, ResumeRow, Skill,
};
use crate::models::user::UserRow;
use crate::resume::completion::{completion_details, CompletionDetails};
use crate::resume::items::{
    self, CertificationInput, CertificationPatch, EducationInput, EducationPatch,
    ExperienceInput, ExperiencePatch, LanguageInput, LanguagePatch, SkillInput, SkillPatch,
};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

/// Bulk replacement body for PATCH /api/v1/resume. Absent sections are left
/// untouched; a present section replaces the whole array.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResumeRequest {
    pub experiences: Option<Vec<Value>>,
    pub skills: Option<Vec<Value>>,
    pub languages: Option<Vec<Value>>,
    pub educations: Option<Vec<Value>>,
    pub certifications: Option<Vec<Value>>,
}

impl UpdateResumeRequest {
    fn is_empty(&self) -> bool {
        self.experiences.is_none()
            && self.skills.is_none()
            && self.languages.is_none()
            && self.educations.is_none()
            && self.certifications.is_none()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Shared queries
// ────────────────────────────────────────────────────────────────────────────

pub(crate) async fn find_by_user(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<ResumeRow>, AppError> {
    let resume = sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 AND deleted_at IS NULL
         ORDER BY updated_at DESC LIMIT 1",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(resume)
}

/// Returns the user's résumé, creating an empty one on first access.
/// Concurrent first calls race on the partial unique index; the loser
/// re-reads the winner's row.
pub(crate) async fn find_or_create(pool: &PgPool, user_id: Uuid) -> Result<ResumeRow, AppError> {
    if let Some(resume) = find_by_user(pool, user_id).await? {
        return Ok(resume);
    }

    let inserted = sqlx::query_as::<_, ResumeRow>(
        "INSERT INTO resumes (id, user_id) VALUES ($1, $2)
         ON CONFLICT (user_id) WHERE deleted_at IS NULL DO NOTHING
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    match inserted {
        Some(resume) => Ok(resume),
        None => find_by_user(pool, user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Resume not found".to_string())),
    }
}

async fn fetch_user(pool: &PgPool, user_id: Uuid) -> Result<UserRow, AppError> {
    sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))
}

/// Canonicalizes a raw bulk-replace array: assigns ids and timestamps where
/// missing, re-serializes through the typed item so stored arrays keep a
/// uniform shape.
fn normalize_items<T>(raw: Vec<Value>, now: DateTime<Utc>, label: &str) -> Result<Value, AppError>
where
    T: serde::de::DeserializeOwned + serde::Serialize,
{
    let mut out = Vec::with_capacity(raw.len());
    for mut item in raw {
        let obj = item
            .as_object_mut()
            .ok_or_else(|| AppError::Validation(format!("Each {label} must be an object")))?;

        let has_id = obj.get("id").map(Value::is_string).unwrap_or(false);
        if !has_id {
            obj.insert("id".to_string(), Value::String(Uuid::new_v4().to_string()));
        }
        if !obj.contains_key("createdAt") {
            obj.insert("createdAt".to_string(), serde_json::json!(now));
        }
        obj.insert("updatedAt".to_string(), serde_json::json!(now));

        let typed: T = serde_json::from_value(item)
            .map_err(|e| AppError::Validation(format!("Invalid {label}: {e}")))?;
        out.push(serde_json::to_value(typed).map_err(|e| AppError::Internal(e.into()))?);
    }
    Ok(Value::Array(out))
}

// ────────────────────────────────────────────────────────────────────────────
// Résumé handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resume
///
/// Creates the caller's résumé. Idempotent: a second call returns the
/// existing row.
pub async fn handle_create_resume(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = find_or_create(&state.db, auth.user_id).await?;
    Ok(Json(resume))
}

/// GET /api/v1/resume
///
/// Returns the caller's résumé, creating an empty one on first access.
pub async fn handle_get_resume(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = find_or_create(&state.db, auth.user_id).await?;
    Ok(Json(resume))
}

/// PATCH /api/v1/resume
///
/// Bulk-replaces whole section arrays inside one transaction and recomputes
/// the completion score. Items without ids get server-assigned ids.
pub async fn handle_update_resume(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<UpdateResumeRequest>,
) -> Result<Json<ResumeRow>, AppError> {
    let updated = apply_bulk_update(&state.db, auth.user_id, body).await?;
    Ok(Json(updated))
}

/// Shared by the PATCH handler and the session-transfer import.
pub(crate) async fn apply_bulk_update(
    pool: &PgPool,
    user_id: Uuid,
    body: UpdateResumeRequest,
) -> Result<ResumeRow, AppError> {
    let mut tx = pool.begin().await?;

    let current = sqlx::query_as::<_, ResumeRow>(
        "SELECT * FROM resumes WHERE user_id = $1 AND deleted_at IS NULL FOR UPDATE",
    )
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?
    .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;

    let updated = if body.is_empty() {
        current
    } else {
        let now = Utc::now();
        let experiences = match body.experiences {
            Some(raw) => normalize_items::<Experience>(raw, now, "experience")?,
            None => current.experiences.clone(),
        };
        let skills = match body.skills {
            Some(raw) => normalize_items::<Skill>(raw, now, "skill")?,
            None => current.skills.clone(),
        };
        let languages = match body.languages {
            Some(raw) => normalize_items::<Language>(raw, now, "language")?,
            None => current.languages.clone(),
        };
        let educations = match body.educations {
            Some(raw) => normalize_items::<Education>(raw, now, "education")?,
            None => current.educations.clone(),
        };
        let certifications = match body.certifications {
            Some(raw) => normalize_items::<Certification>(raw, now, "certification")?,
            None => current.certifications.clone(),
        };

        sqlx::query_as::<_, ResumeRow>(
            "UPDATE resumes
             SET experiences = $1, skills = $2, languages = $3,
                 educations = $4, certifications = $5, updated_at = NOW()
             WHERE id = $6
             RETURNING *",
        )
        .bind(experiences)
        .bind(skills)
        .bind(languages)
        .bind(educations)
        .bind(certifications)
        .bind(current.id)
        .fetch_one(&mut *tx)
        .await?
    };

    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(&mut *tx)
        .await?;
    let updated = items::sync_completion_score(&mut tx, updated, &user).await?;

    tx.commit().await?;
    Ok(updated)
}

/// GET /api/v1/resume/completion-details
///
/// Per-field completion checklist for the caller's résumé.
pub async fn handle_completion_details(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<CompletionDetails>, AppError> {
    let resume = find_by_user(&state.db, auth.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Resume not found".to_string()))?;
    let user = fetch_user(&state.db, auth.user_id).await?;

    Ok(Json(completion_details(&user, &resume)))
}

// ────────────────────────────────────────────────────────────────────────────
// Section item handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/resume/experiences
pub async fn handle_add_experience(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<ExperienceInput>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::add_experience(&state.db, auth.user_id, body).await?;
    Ok(Json(resume))
}

/// PATCH /api/v1/resume/experiences/:id
pub async fn handle_update_experience(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<ExperiencePatch>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::update_experience(&state.db, auth.user_id, item_id, body).await?;
    Ok(Json(resume))
}

/// DELETE /api/v1/resume/experiences/:id
pub async fn handle_delete_experience(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::delete_experience(&state.db, auth.user_id, item_id).await?;
    Ok(Json(resume))
}

/// POST /api/v1/resume/skills
pub async fn handle_add_skill(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<SkillInput>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::add_skill(&state.db, auth.user_id, body).await?;
    Ok(Json(resume))
}

/// PATCH /api/v1/resume/skills/:id
pub async fn handle_update_skill(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<SkillPatch>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::update_skill(&state.db, auth.user_id, item_id, body).await?;
    Ok(Json(resume))
}

/// DELETE /api/v1/resume/skills/:id
pub async fn handle_delete_skill(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::delete_skill(&state.db, auth.user_id, item_id).await?;
    Ok(Json(resume))
}

/// POST /api/v1/resume/languages
pub async fn handle_add_language(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<LanguageInput>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::add_language(&state.db, auth.user_id, body).await?;
    Ok(Json(resume))
}

/// PATCH /api/v1/resume/languages/:id
pub async fn handle_update_language(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<LanguagePatch>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::update_language(&state.db, auth.user_id, item_id, body).await?;
    Ok(Json(resume))
}

/// DELETE /api/v1/resume/languages/:id
pub async fn handle_delete_language(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::delete_language(&state.db, auth.user_id, item_id).await?;
    Ok(Json(resume))
}

/// POST /api/v1/resume/educations
pub async fn handle_add_education(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<EducationInput>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::add_education(&state.db, auth.user_id, body).await?;
    Ok(Json(resume))
}

/// PATCH /api/v1/resume/educations/:id
pub async fn handle_update_education(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<EducationPatch>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::update_education(&state.db, auth.user_id, item_id, body).await?;
    Ok(Json(resume))
}

/// DELETE /api/v1/resume/educations/:id
pub async fn handle_delete_education(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::delete_education(&state.db, auth.user_id, item_id).await?;
    Ok(Json(resume))
}

/// POST /api/v1/resume/certifications
pub async fn handle_add_certification(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CertificationInput>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::add_certification(&state.db, auth.user_id, body).await?;
    Ok(Json(resume))
}

/// PATCH /api/v1/resume/certifications/:id
pub async fn handle_update_certification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
    Json(body): Json<CertificationPatch>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::update_certification(&state.db, auth.user_id, item_id, body).await?;
    Ok(Json(resume))
}

/// DELETE /api/v1/resume/certifications/:id
pub async fn handle_delete_certification(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(item_id): Path<Uuid>,
) -> Result<Json<ResumeRow>, AppError> {
    let resume = items::delete_certification(&state.db, auth.user_id, item_id).await?;
    Ok(Json(resume))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_body_detected() {
        let body: UpdateResumeRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(body.is_empty());

        let body: UpdateResumeRequest =
            serde_json::from_value(serde_json::json!({"skills": []})).unwrap();
        assert!(!body.is_empty());
    }

    #[test]
    fn test_normalize_assigns_id_and_timestamps() {
        let now = Utc::now();
        let raw = vec![serde_json::json!({"name": "Rust", "level": "advanced"})];
        let normalized = normalize_items::<Skill>(raw, now, "skill").unwrap();

        let items: Vec<Skill> = serde_json::from_value(normalized).unwrap();
        assert_eq!(items.len(), 1);
        assert!(!items[0].id.is_nil());
        assert_eq!(items[0].created_at, now);
        assert_eq!(items[0].updated_at, now);
    }

    #[test]
    fn test_normalize_keeps_existing_id_and_created_at() {
        let now = Utc::now();
        let id = Uuid::new_v4();
        let created = now - chrono::Duration::days(3);
        let raw = vec![serde_json::json!({
            "id": id,
            "name": "Rust",
            "createdAt": created,
        })];
        let normalized = normalize_items::<Skill>(raw, now, "skill").unwrap();

        let items: Vec<Skill> = serde_json::from_value(normalized).unwrap();
        assert_eq!(items[0].id, id);
        assert_eq!(items[0].created_at, created);
        assert_eq!(items[0].updated_at, now);
    }

    #[test]
    fn test_normalize_rejects_non_object() {
        let err = normalize_items::<Skill>(vec![serde_json::json!("nope")], Utc::now(), "skill")
            .err()
            .unwrap();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_normalize_rejects_missing_required_field() {
        let raw = vec![serde_json::json!({"level": "advanced"})];
        let err = normalize_items::<Skill>(raw, Utc::now(), "skill").err().unwrap();
        match err {
            AppError::Validation(msg) => assert!(msg.contains("skill")),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_drops_unknown_fields() {
        let raw = vec![serde_json::json!({"name": "Rust", "bogus": true})];
        let normalized = normalize_items::<Skill>(raw, Utc::now(), "skill").unwrap();
        assert!(normalized[0].get("bogus").is_none());
    }
}
