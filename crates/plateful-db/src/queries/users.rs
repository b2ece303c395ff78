//! Database query functions for the `users` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

/// Insert a new user. Returns the row with server-generated defaults
/// (id, created_at).
pub async fn insert_user(
    pool: &PgPool,
    handle: &str,
    display_name: &str,
    bio: Option<&str>,
) -> Result<User> {
    let user = sqlx::query_as::<_, User>(
        "INSERT INTO users (handle, display_name, bio) \
         VALUES ($1, $2, $3) \
         RETURNING *",
    )
    .bind(handle)
    .bind(display_name)
    .bind(bio)
    .fetch_one(pool)
    .await
    .with_context(|| format!("failed to insert user {handle:?}"))?;

    Ok(user)
}

/// Fetch a user by ID.
pub async fn get_user(pool: &PgPool, id: Uuid) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user")?;

    Ok(user)
}

/// Fetch a user by handle.
pub async fn get_user_by_handle(pool: &PgPool, handle: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE handle = $1")
        .bind(handle)
        .fetch_optional(pool)
        .await
        .context("failed to fetch user by handle")?;

    Ok(user)
}

/// List all users ordered by handle.
pub async fn list_users(pool: &PgPool) -> Result<Vec<User>> {
    let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY handle")
        .fetch_all(pool)
        .await
        .context("failed to list users")?;

    Ok(users)
}
