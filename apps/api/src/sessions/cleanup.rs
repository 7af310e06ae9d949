//! Periodic sweep of expired anonymous sessions.

use std::time::Duration;

use sqlx::PgPool;
use tracing::{error, info};

use crate::errors::AppError;

/// Deletes anonymous sessions past their TTL. Converted sessions are kept;
/// the conversion metrics read them.
pub async fn delete_expired_sessions(pool: &PgPool) -> Result<u64, AppError> {
    let result =
        sqlx::query("DELETE FROM chat_sessions WHERE expires_at < NOW() AND is_anonymous = TRUE")
            .execute(pool)
            .await?;
    Ok(result.rows_affected())
}

/// Runs forever; spawned once at startup. The first sweep happens
/// immediately, then every `every_secs`.
pub async fn run_sweeper(pool: PgPool, every_secs: u64) {
    let mut ticker = tokio::time::interval(Duration::from_secs(every_secs.max(1)));
    loop {
        ticker.tick().await;
        match delete_expired_sessions(&pool).await {
            Ok(0) => {}
            Ok(count) => info!(count, "expired anonymous sessions removed"),
            Err(e) => error!("session sweep failed: {e}"),
        }
    }
}
