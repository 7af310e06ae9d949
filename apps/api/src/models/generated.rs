use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// A job-tailored résumé snapshot. `content` freezes the base résumé and the
/// owner's profile fields at creation time.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct GeneratedResumeRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub base_resume_id: Uuid,
    pub title: String,
    pub job_description: Option<String>,
    pub content: Value,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
