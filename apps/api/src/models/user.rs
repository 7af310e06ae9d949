use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A user row. Serialized as-is in API responses (soft-delete timestamp
/// included, password-free by construction).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub full_name: String,
    pub avatar_url: Option<String>,
    pub plan_type: String,
    pub is_admin: bool,
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
    pub personality_generated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}
