//! Axum route handlers for the users API.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::pagination::{PageQuery, Paginated};
use crate::models::user::UserRow;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateUserRequest {
    pub email: String,
    pub full_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub cpf: Option<String>,
    #[serde(default)]
    pub birth_date: Option<String>,
    #[serde(default)]
    pub has_disability: Option<bool>,
    #[serde(default)]
    pub race: Option<String>,
    #[serde(default)]
    pub sexual_orientation: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub salary_expectation: Option<String>,
    #[serde(default)]
    pub has_cnh: Option<bool>,
    #[serde(default)]
    pub instagram: Option<String>,
    #[serde(default)]
    pub facebook: Option<String>,
    #[serde(default)]
    pub linkedin: Option<String>,
    #[serde(default)]
    pub portfolio: Option<String>,
    #[serde(default)]
    pub professional_summary: Option<String>,
    #[serde(default)]
    pub career_goals: Option<String>,
}

/// Partial profile update. Absent fields keep their current value; clearing
/// is done with an empty string, not null.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub plan_type: Option<String>,
    pub phone: Option<String>,
    pub cpf: Option<String>,
    pub birth_date: Option<String>,
    pub has_disability: Option<bool>,
    pub race: Option<String>,
    pub sexual_orientation: Option<String>,
    pub gender: Option<String>,
    pub state: Option<String>,
    pub city: Option<String>,
    pub salary_expectation: Option<String>,
    pub has_cnh: Option<bool>,
    pub instagram: Option<String>,
    pub facebook: Option<String>,
    pub linkedin: Option<String>,
    pub portfolio: Option<String>,
    pub professional_summary: Option<String>,
    pub career_goals: Option<String>,
    pub personality_profile: Option<Value>,
}

fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("Invalid email".to_string()));
    }
    Ok(())
}

// ────────────────────────────────────────────────────────────────────────────
// Shared queries
// ────────────────────────────────────────────────────────────────────────────

pub(crate) async fn find_active_by_id(
    pool: &PgPool,
    user_id: Uuid,
) -> Result<Option<UserRow>, AppError> {
    let user = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE id = $1 AND deleted_at IS NULL",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;
    Ok(user)
}

async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, AppError> {
    let user = sqlx::query_as::<_, UserRow>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;
    Ok(user)
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/users
///
/// Registers a user. Email uniqueness maps to 409.
pub async fn handle_create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<UserRow>), AppError> {
    validate_email(&body.email)?;
    if body.full_name.trim().is_empty() {
        return Err(AppError::Validation("full_name is required".to_string()));
    }

    if find_by_email(&state.db, &body.email).await?.is_some() {
        return Err(AppError::Conflict("Email already in use".to_string()));
    }

    let user = sqlx::query_as::<_, UserRow>(
        "INSERT INTO users (
            id, email, full_name, avatar_url, phone, cpf, birth_date,
            has_disability, race, sexual_orientation, gender, state, city,
            salary_expectation, has_cnh, instagram, facebook, linkedin,
            portfolio, professional_summary, career_goals
         ) VALUES (
            $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
            $16, $17, $18, $19, $20, $21
         ) RETURNING *",
    )
    .bind(Uuid::new_v4())
    .bind(body.email.trim())
    .bind(body.full_name.trim())
    .bind(body.avatar_url)
    .bind(body.phone)
    .bind(body.cpf)
    .bind(body.birth_date)
    .bind(body.has_disability)
    .bind(body.race)
    .bind(body.sexual_orientation)
    .bind(body.gender)
    .bind(body.state)
    .bind(body.city)
    .bind(body.salary_expectation)
    .bind(body.has_cnh)
    .bind(body.instagram)
    .bind(body.facebook)
    .bind(body.linkedin)
    .bind(body.portfolio)
    .bind(body.professional_summary)
    .bind(body.career_goals)
    .fetch_one(&state.db)
    .await?;

    Ok((StatusCode::CREATED, Json(user)))
}

/// GET /api/v1/users?page=&limit=
///
/// Paginated listing, newest first, soft-deleted users excluded.
pub async fn handle_list_users(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Paginated<UserRow>>, AppError> {
    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE deleted_at IS NULL")
        .fetch_one(&state.db)
        .await?;

    let users = sqlx::query_as::<_, UserRow>(
        "SELECT * FROM users WHERE deleted_at IS NULL
         ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(query.limit.max(1) as i64)
    .bind(query.offset())
    .fetch_all(&state.db)
    .await?;

    Ok(Json(Paginated::new(users, total, query)))
}

/// GET /api/v1/users/:id
pub async fn handle_get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Json<UserRow>, AppError> {
    let user = find_active_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;
    Ok(Json(user))
}

/// PATCH /api/v1/users/:id
///
/// Partial profile update. Changing the email to one held by another user
/// maps to 409.
pub async fn handle_update_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<UserRow>, AppError> {
    find_active_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    if let Some(email) = body.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email)?;
        if let Some(holder) = find_by_email(&state.db, email).await? {
            if holder.id != user_id {
                return Err(AppError::Conflict("Email already in use".to_string()));
            }
        }
    }

    let user = sqlx::query_as::<_, UserRow>(
        "UPDATE users SET
            email = COALESCE($1, email),
            full_name = COALESCE($2, full_name),
            avatar_url = COALESCE($3, avatar_url),
            plan_type = COALESCE($4, plan_type),
            phone = COALESCE($5, phone),
            cpf = COALESCE($6, cpf),
            birth_date = COALESCE($7, birth_date),
            has_disability = COALESCE($8, has_disability),
            race = COALESCE($9, race),
            sexual_orientation = COALESCE($10, sexual_orientation),
            gender = COALESCE($11, gender),
            state = COALESCE($12, state),
            city = COALESCE($13, city),
            salary_expectation = COALESCE($14, salary_expectation),
            has_cnh = COALESCE($15, has_cnh),
            instagram = COALESCE($16, instagram),
            facebook = COALESCE($17, facebook),
            linkedin = COALESCE($18, linkedin),
            portfolio = COALESCE($19, portfolio),
            professional_summary = COALESCE($20, professional_summary),
            career_goals = COALESCE($21, career_goals),
            personality_profile = COALESCE($22, personality_profile),
            updated_at = NOW()
         WHERE id = $23
         RETURNING *",
    )
    .bind(body.email.map(|e| e.trim().to_string()))
    .bind(body.full_name)
    .bind(body.avatar_url)
    .bind(body.plan_type)
    .bind(body.phone)
    .bind(body.cpf)
    .bind(body.birth_date)
    .bind(body.has_disability)
    .bind(body.race)
    .bind(body.sexual_orientation)
    .bind(body.gender)
    .bind(body.state)
    .bind(body.city)
    .bind(body.salary_expectation)
    .bind(body.has_cnh)
    .bind(body.instagram)
    .bind(body.facebook)
    .bind(body.linkedin)
    .bind(body.portfolio)
    .bind(body.professional_summary)
    .bind(body.career_goals)
    .bind(body.personality_profile)
    .bind(user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(user))
}

/// DELETE /api/v1/users/:id
///
/// Soft delete; the row stays for referential integrity.
pub async fn handle_delete_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    find_active_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    sqlx::query("UPDATE users SET deleted_at = NOW(), updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email_accepts_plain_address() {
        assert!(validate_email("ana@example.com").is_ok());
    }

    #[test]
    fn test_validate_email_rejects_missing_at() {
        assert!(validate_email("ana.example.com").is_err());
    }

    #[test]
    fn test_validate_email_rejects_blank() {
        assert!(validate_email("   ").is_err());
    }

    #[test]
    fn test_update_request_defaults_to_all_none() {
        let body: UpdateUserRequest = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(body.email.is_none());
        assert!(body.personality_profile.is_none());
    }

    #[test]
    fn test_create_request_requires_email_and_name() {
        let result: Result<CreateUserRequest, _> =
            serde_json::from_value(serde_json::json!({"email": "a@b.c"}));
        assert!(result.is_err());

        let body: CreateUserRequest = serde_json::from_value(serde_json::json!({
            "email": "a@b.c",
            "full_name": "Ana",
        }))
        .unwrap();
        assert!(body.phone.is_none());
    }
}
