//! DISC-style personality profile: four quadrant scores generated by the AI
//! service and stored on the user row as jsonb.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use crate::ai_client::PersonalityResponse;
use crate::auth::{AuthUser, MaybeAuthUser};
use crate::errors::AppError;
use crate::resume;
use crate::state::AppState;
use crate::users::handlers::find_active_by_id;

/// Quadrant key, display label, UI badge color.
const PERSONALITY_CONFIG: [(&str, &str, &str); 4] = [
    ("executor", "Executor", "bg-red-500"),
    ("communicator", "Communicator", "bg-yellow-500"),
    ("planner", "Planner", "bg-green-500"),
    ("analyst", "Analyst", "bg-blue-500"),
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PersonalityScore {
    pub key: &'static str,
    pub label: &'static str,
    pub color: &'static str,
    pub score: f64,
}

#[derive(Debug, Serialize)]
pub struct DominantProfile {
    pub primary: PersonalityScore,
    pub secondary: PersonalityScore,
    pub scores: Vec<PersonalityScore>,
}

/// Ranks the four quadrants of a stored profile. Missing or non-numeric
/// scores count as zero; ties keep the earlier quadrant.
pub fn dominant_profile(profile: &Value) -> DominantProfile {
    let scores: Vec<PersonalityScore> = PERSONALITY_CONFIG
        .iter()
        .map(|(key, label, color)| PersonalityScore {
            key,
            label,
            color,
            score: profile.get(*key).and_then(Value::as_f64).unwrap_or(0.0),
        })
        .collect();

    let mut primary = scores[0].clone();
    for candidate in &scores[1..] {
        if candidate.score > primary.score {
            primary = candidate.clone();
        }
    }

    let mut secondary: Option<PersonalityScore> = None;
    for candidate in &scores {
        if candidate.key == primary.key {
            continue;
        }
        match &secondary {
            Some(current) if candidate.score <= current.score => {}
            _ => secondary = Some(candidate.clone()),
        }
    }
    let secondary = secondary.unwrap_or_else(|| primary.clone());

    DominantProfile {
        primary,
        secondary,
        scores,
    }
}

/// Profile data shipped to the AI service, only for users with a résumé.
async fn collect_user_data(pool: &PgPool, user_id: Uuid) -> Result<Option<Value>, AppError> {
    let user = find_active_by_id(pool, user_id).await?;
    let resume = resume::handlers::find_by_user(pool, user_id).await?;

    match (user, resume) {
        (Some(user), Some(resume)) => Ok(Some(serde_json::json!({
            "professional_summary": user.professional_summary,
            "career_goals": user.career_goals,
            "experiences": resume.experiences,
            "skills": resume.skills,
        }))),
        _ => Ok(None),
    }
}

/// GET /api/v1/users/me/personality-profile
///
/// Returns the caller's ranked quadrant profile; 404 until one has been
/// generated.
pub async fn handle_get_personality_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<DominantProfile>, AppError> {
    let profile = find_active_by_id(&state.db, auth.user_id)
        .await?
        .and_then(|user| user.personality_profile)
        .ok_or_else(|| AppError::NotFound("Personality profile not found".to_string()))?;

    Ok(Json(dominant_profile(&profile)))
}

/// POST /api/v1/ai/generate-personality
///
/// Generates a profile via the AI service. Authenticated callers get their
/// profile data included and the result persisted; anonymous callers get a
/// one-off generic profile.
pub async fn handle_generate_personality(
    State(state): State<AppState>,
    MaybeAuthUser(user_id): MaybeAuthUser,
) -> Result<Json<PersonalityResponse>, AppError> {
    let user_data = match user_id {
        Some(id) => collect_user_data(&state.db, id).await?,
        None => None,
    };

    let response = state
        .ai
        .generate_personality(user_id, user_data.as_ref())
        .await
        .map_err(|e| AppError::Ai(format!("Failed to generate personality: {e}")))?;

    if let Some(id) = user_id {
        sqlx::query(
            "UPDATE users SET personality_profile = $1, personality_generated_at = NOW(),
             updated_at = NOW() WHERE id = $2",
        )
        .bind(&response.personality)
        .bind(id)
        .execute(&state.db)
        .await?;
    }

    Ok(Json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dominant_profile_ranks_highest_first() {
        let profile = json!({
            "executor": 20,
            "communicator": 85,
            "planner": 40,
            "analyst": 60,
        });
        let dominant = dominant_profile(&profile);
        assert_eq!(dominant.primary.key, "communicator");
        assert_eq!(dominant.secondary.key, "analyst");
        assert_eq!(dominant.scores.len(), 4);
    }

    #[test]
    fn test_dominant_profile_tie_keeps_first_quadrant() {
        let profile = json!({
            "executor": 50,
            "communicator": 50,
            "planner": 10,
            "analyst": 10,
        });
        let dominant = dominant_profile(&profile);
        assert_eq!(dominant.primary.key, "executor");
        assert_eq!(dominant.secondary.key, "communicator");
    }

    #[test]
    fn test_dominant_profile_missing_keys_score_zero() {
        let profile = json!({ "planner": 70 });
        let dominant = dominant_profile(&profile);
        assert_eq!(dominant.primary.key, "planner");
        assert_eq!(dominant.primary.score, 70.0);
        assert_eq!(dominant.secondary.score, 0.0);
    }

    #[test]
    fn test_dominant_profile_colors_follow_config() {
        let dominant = dominant_profile(&json!({"executor": 1}));
        assert_eq!(dominant.primary.color, "bg-red-500");
        let analyst = dominant.scores.iter().find(|s| s.key == "analyst").unwrap();
        assert_eq!(analyst.color, "bg-blue-500");
    }
}
