//! Axum route handlers for generated résumé snapshots.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::errors::AppError;
use crate::models::generated::GeneratedResumeRow;
use crate::models::pagination::{PageQuery, Paginated};
use crate::models::resume::ResumeRow;
use crate::models::user::UserRow;
use crate::resume::handlers::find_by_user;
use crate::state::AppState;

const DEFAULT_TITLE: &str = "Optimized Resume";

// ────────────────────────────────────────────────────────────────────────────
// Request / response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateGeneratedResumeRequest {
    /// Job description (or chat instruction) the snapshot is tailored to.
    pub message: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGeneratedResumeRequest {
    pub title: Option<String>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedResumeFilter {
    #[serde(rename = "baseResumeId", default)]
    pub base_resume_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedResumeCreated {
    pub id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Shared lookups
// ────────────────────────────────────────────────────────────────────────────

/// Loads a snapshot and enforces ownership: 404 when missing, 403 when it
/// belongs to someone else.
async fn find_owned(
    pool: &PgPool,
    id: Uuid,
    user_id: Uuid,
) -> Result<GeneratedResumeRow, AppError> {
    let row =
        sqlx::query_as::<_, GeneratedResumeRow>("SELECT * FROM generated_resumes WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Generated resume not found".into()))?;
    if row.user_id != user_id {
        return Err(AppError::Forbidden(
            "Access denied to this generated resume".into(),
        ));
    }
    Ok(row)
}

/// Freezes the owner's profile fields and the résumé's section arrays.
fn snapshot_content(user: &UserRow, resume: &ResumeRow) -> Value {
    json!({
        "full_name": user.full_name,
        "email": user.email,
        "phone": user.phone,
        "linkedin": user.linkedin,
        "cpf": user.cpf,
        "birth_date": user.birth_date,
        "has_disability": user.has_disability,
        "race": user.race,
        "sexual_orientation": user.sexual_orientation,
        "gender": user.gender,
        "professional_summary": user.professional_summary,
        "career_goals": user.career_goals,
        "city": user.city,
        "state": user.state,
        "salary_expectation": user.salary_expectation,
        "has_cnh": user.has_cnh,
        "instagram": user.instagram,
        "facebook": user.facebook,
        "portfolio": user.portfolio,
        "experiences": resume.experiences,
        "skills": resume.skills,
        "languages": resume.languages,
        "educations": resume.educations,
        "certifications": resume.certifications,
    })
}

fn effective_title(title: Option<String>) -> String {
    title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_TITLE.to_string())
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/generated-resumes
pub async fn handle_create_generated(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<CreateGeneratedResumeRequest>,
) -> Result<(StatusCode, Json<GeneratedResumeCreated>), AppError> {
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("Message must not be empty".into()));
    }

    let base_resume = find_by_user(&state.db, auth.user_id).await?.ok_or_else(|| {
        AppError::NotFound("Base resume not found for user. Please create a resume first.".into())
    })?;
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL")
        .bind(auth.user_id)
        .fetch_optional(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found for resume".into()))?;

    let row = sqlx::query_as::<_, GeneratedResumeRow>(
        "INSERT INTO generated_resumes
            (id, user_id, base_resume_id, title, job_description, content)
         VALUES ($1, $2, $3, $4, $5, $6)
         RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(auth.user_id)
    .bind(base_resume.id)
    .bind(effective_title(body.title))
    .bind(&body.message)
    .bind(snapshot_content(&user, &base_resume))
    .fetch_one(&state.db)
    .await?;

    tracing::info!(id = %row.id, user_id = %auth.user_id, "generated resume created");

    Ok((
        StatusCode::CREATED,
        Json(GeneratedResumeCreated {
            id: row.id,
            title: row.title,
            created_at: row.created_at,
        }),
    ))
}

/// GET /api/v1/generated-resumes?page=&limit=&baseResumeId=
///
/// Paginated listing, newest first, optionally filtered by base résumé.
pub async fn handle_list_generated(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<PageQuery>,
    Query(filter): Query<GeneratedResumeFilter>,
) -> Result<Json<Paginated<GeneratedResumeRow>>, AppError> {
    let total: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM generated_resumes
          WHERE user_id = $1 AND ($2::uuid IS NULL OR base_resume_id = $2)",
    )
    .bind(auth.user_id)
    .bind(filter.base_resume_id)
    .fetch_one(&state.db)
    .await?;

    let rows = sqlx::query_as::<_, GeneratedResumeRow>(
        "SELECT * FROM generated_resumes
          WHERE user_id = $1 AND ($2::uuid IS NULL OR base_resume_id = $2)
          ORDER BY created_at DESC LIMIT $3 OFFSET $4",
    )
    .bind(auth.user_id)
    .bind(filter.base_resume_id)
    .bind(query.limit.max(1) as i64)
    .bind(query.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Paginated::new(rows, total, query)))
}

/// GET /api/v1/generated-resumes/:id
pub async fn handle_get_generated(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<GeneratedResumeRow>, AppError> {
    let row = find_owned(&state.db, id, auth.user_id).await?;
    Ok(Json(row))
}

/// PATCH /api/v1/generated-resumes/:id
///
/// Renames or publishes/unpublishes a snapshot. The content blob is frozen.
pub async fn handle_update_generated(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<UpdateGeneratedResumeRequest>,
) -> Result<Json<GeneratedResumeRow>, AppError> {
    if let Some(title) = &body.title {
        if title.trim().is_empty() {
            return Err(AppError::Validation("Title must not be empty".into()));
        }
    }
    find_owned(&state.db, id, auth.user_id).await?;

    let row = sqlx::query_as::<_, GeneratedResumeRow>(
        "UPDATE generated_resumes
            SET title = COALESCE($1, title),
                is_published = COALESCE($2, is_published),
                updated_at = NOW()
          WHERE id = $3
          RETURNING *",
    )
    .bind(body.title)
    .bind(body.is_published)
    .bind(id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(row))
}

/// DELETE /api/v1/generated-resumes/:id (hard delete)
pub async fn handle_delete_generated(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Value>, AppError> {
    find_owned(&state.db, id, auth.user_id).await?;
    sqlx::query("DELETE FROM generated_resumes WHERE id = $1")
        .bind(id)
        .execute(&state.db)
        .await?;
    tracing::info!(id = %id, "generated resume deleted");
    Ok(Json(json!({ "message": "Generated resume deleted successfully" })))
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn make_user() -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            full_name: "Ana Lima".to_string(),
            avatar_url: None,
            plan_type: "free".to_string(),
            is_admin: false,
            phone: Some("+55 11 99999-0000".to_string()),
            cpf: None,
            birth_date: None,
            has_disability: None,
            race: None,
            sexual_orientation: None,
            gender: None,
            state: Some("SP".to_string()),
            city: Some("São Paulo".to_string()),
            salary_expectation: None,
            has_cnh: None,
            instagram: None,
            facebook: None,
            linkedin: Some("linkedin.com/in/ana".to_string()),
            portfolio: None,
            professional_summary: Some("Backend engineer".to_string()),
            career_goals: None,
            personality_profile: None,
            personality_generated_at: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn make_resume(user_id: Uuid) -> ResumeRow {
        let now = Utc::now();
        ResumeRow {
            id: Uuid::new_v4(),
            user_id,
            experiences: json!([{ "position": "Engineer", "company": "Acme" }]),
            skills: json!([{ "name": "Rust" }]),
            languages: json!([]),
            educations: json!([]),
            certifications: json!([]),
            completion_score: 40,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[test]
    fn test_snapshot_freezes_profile_and_sections() {
        let user = make_user();
        let resume = make_resume(user.id);
        let content = snapshot_content(&user, &resume);

        assert_eq!(content["full_name"], json!("Ana Lima"));
        assert_eq!(content["email"], json!("ana@example.com"));
        assert_eq!(content["city"], json!("São Paulo"));
        assert_eq!(content["experiences"], resume.experiences);
        assert_eq!(content["skills"], resume.skills);
        assert_eq!(content["educations"], json!([]));
    }

    #[test]
    fn test_snapshot_keeps_missing_fields_as_null() {
        let user = make_user();
        let resume = make_resume(user.id);
        let content = snapshot_content(&user, &resume);

        assert!(content["cpf"].is_null());
        assert!(content["salary_expectation"].is_null());
    }

    #[test]
    fn test_title_defaults_when_blank() {
        assert_eq!(effective_title(None), DEFAULT_TITLE);
        assert_eq!(effective_title(Some("  ".into())), DEFAULT_TITLE);
        assert_eq!(effective_title(Some(" For Acme ".into())), "For Acme");
    }
}
