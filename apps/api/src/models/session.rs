use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

/// An anonymous chat session. Created with a 24h TTL; transferring it to a
/// logged-in user sets `user_id`, clears `is_anonymous` and stamps
/// `converted_at`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatSessionRow {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<Uuid>,
    pub chat_id: Option<Uuid>,
    pub is_anonymous: bool,
    pub source: String,
    pub resume_data: Option<Value>,
    pub original_resume_data: Option<Value>,
    pub expires_at: DateTime<Utc>,
    pub converted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ChatSessionRow {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// A session can be transferred exactly once.
    pub fn is_transferred(&self) -> bool {
        !self.is_anonymous || self.user_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn make_session() -> ChatSessionRow {
        let now = Utc::now();
        ChatSessionRow {
            id: Uuid::new_v4(),
            session_id: Uuid::new_v4(),
            user_id: None,
            chat_id: None,
            is_anonymous: true,
            source: "web".to_string(),
            resume_data: None,
            original_resume_data: None,
            expires_at: now + Duration::hours(24),
            converted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_fresh_session_is_not_expired() {
        let session = make_session();
        assert!(!session.is_expired(Utc::now()));
    }

    #[test]
    fn test_session_expires_after_ttl() {
        let session = make_session();
        assert!(session.is_expired(Utc::now() + Duration::hours(25)));
    }

    #[test]
    fn test_fresh_session_is_not_transferred() {
        assert!(!make_session().is_transferred());
    }

    #[test]
    fn test_converted_session_counts_as_transferred() {
        let mut session = make_session();
        session.is_anonymous = false;
        session.user_id = Some(Uuid::new_v4());
        assert!(session.is_transferred());
    }

    #[test]
    fn test_session_with_user_but_still_anonymous_is_transferred() {
        // Guards against double transfer when a crash left the flags half set.
        let mut session = make_session();
        session.user_id = Some(Uuid::new_v4());
        assert!(session.is_transferred());
    }
}
