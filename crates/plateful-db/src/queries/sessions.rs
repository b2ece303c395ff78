//! Database query functions for the `sessions` table.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::SessionRecord;

/// Open a session for `user_id` that expires at `expires_at`.
pub async fn insert_session(
    pool: &PgPool,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<SessionRecord> {
    let session = sqlx::query_as::<_, SessionRecord>(
        "INSERT INTO sessions (user_id, expires_at) \
         VALUES ($1, $2) \
         RETURNING *",
    )
    .bind(user_id)
    .bind(expires_at)
    .fetch_one(pool)
    .await
    .context("failed to insert session")?;

    Ok(session)
}

/// Fetch a session by ID regardless of liveness.
pub async fn get_session(pool: &PgPool, id: Uuid) -> Result<Option<SessionRecord>> {
    let session = sqlx::query_as::<_, SessionRecord>("SELECT * FROM sessions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch session")?;

    Ok(session)
}

/// Fetch a session only if it is neither revoked nor expired.
pub async fn get_live_session(pool: &PgPool, id: Uuid) -> Result<Option<SessionRecord>> {
    let session = sqlx::query_as::<_, SessionRecord>(
        "SELECT * FROM sessions \
         WHERE id = $1 AND revoked_at IS NULL AND expires_at > now()",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch live session")?;

    Ok(session)
}

/// Mark a session revoked. Returns `false` when no live session matched.
pub async fn revoke_session(pool: &PgPool, id: Uuid) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE sessions SET revoked_at = now() \
         WHERE id = $1 AND revoked_at IS NULL",
    )
    .bind(id)
    .execute(pool)
    .await
    .context("failed to revoke session")?;

    Ok(result.rows_affected() > 0)
}

/// Delete sessions that expired or were revoked before `cutoff`.
/// Returns the number of rows removed.
pub async fn purge_sessions_before(pool: &PgPool, cutoff: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "DELETE FROM sessions \
         WHERE expires_at < $1 OR revoked_at < $1",
    )
    .bind(cutoff)
    .execute(pool)
    .await
    .context("failed to purge sessions")?;

    Ok(result.rows_affected())
}
