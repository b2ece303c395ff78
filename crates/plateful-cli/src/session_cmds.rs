//! CLI handlers for `plateful session` subcommands.
//!
//! Sessions are normally opened by the sign-in flow; these commands cover
//! operations and local testing.
//!
//! Implements:
//! - `plateful session issue <user>`   -- open a session and print its cookie
//! - `plateful session revoke <token>` -- revoke the session a token names
//! - `plateful session purge`          -- delete long-dead session rows

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use plateful_core::session::{
    SessionConfig, open_session, session_set_cookie, validate_session_token,
};
use plateful_db::models::User;
use plateful_db::queries::{sessions as session_db, users as user_db};

use crate::SessionCommands;

/// Dispatch a `SessionCommands` variant to the appropriate handler.
pub async fn run_session_command(
    command: SessionCommands,
    pool: &PgPool,
    config: &SessionConfig,
) -> Result<()> {
    match command {
        SessionCommands::Issue { user } => cmd_issue(pool, config, &user).await,
        SessionCommands::Revoke { token } => cmd_revoke(pool, config, &token).await,
        SessionCommands::Purge { older_than_days } => cmd_purge(pool, older_than_days).await,
    }
}

/// Look a user up by UUID, falling back to handle.
async fn find_user(pool: &PgPool, user: &str) -> Result<User> {
    let found = match Uuid::parse_str(user) {
        Ok(id) => user_db::get_user(pool, id).await?,
        Err(_) => user_db::get_user_by_handle(pool, user.trim_start_matches('@')).await?,
    };
    found.with_context(|| format!("user {user:?} not found"))
}

async fn cmd_issue(pool: &PgPool, config: &SessionConfig, user: &str) -> Result<()> {
    let user = find_user(pool, user).await?;
    let (record, token) = open_session(pool, config, user.id).await?;

    println!("Session {} for @{} expires {}", record.id, user.handle, record.expires_at);
    println!("Set-Cookie: {}", session_set_cookie(&token, config.ttl));
    Ok(())
}

async fn cmd_revoke(pool: &PgPool, config: &SessionConfig, token: &str) -> Result<()> {
    let session_id = validate_session_token(config, token).context("cannot revoke session")?;
    if session_db::revoke_session(pool, session_id).await? {
        println!("Session {session_id} revoked.");
    } else {
        println!("Session {session_id} was already revoked or does not exist.");
    }
    Ok(())
}

/// Sessions that ended before this instant are purged.
fn purge_cutoff(now: DateTime<Utc>, older_than_days: i64) -> Result<DateTime<Utc>> {
    if older_than_days < 0 {
        bail!("--older-than-days must not be negative, got {older_than_days}");
    }
    Duration::try_days(older_than_days)
        .and_then(|window| now.checked_sub_signed(window))
        .with_context(|| format!("--older-than-days is out of range: {older_than_days}"))
}

async fn cmd_purge(pool: &PgPool, older_than_days: i64) -> Result<()> {
    let cutoff = purge_cutoff(Utc::now(), older_than_days)?;
    let removed = session_db::purge_sessions_before(pool, cutoff).await?;
    tracing::info!(removed, %cutoff, "purged sessions");
    println!("Removed {removed} session(s).");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purge_cutoff_subtracts_window() {
        let now = Utc::now();
        assert_eq!(purge_cutoff(now, 30).unwrap(), now - Duration::days(30));
        assert_eq!(purge_cutoff(now, 0).unwrap(), now);
    }

    #[test]
    fn purge_cutoff_rejects_negative_window() {
        let err = purge_cutoff(Utc::now(), -1).unwrap_err();
        assert!(err.to_string().contains("negative"), "unexpected error: {err}");
    }

    #[test]
    fn purge_cutoff_rejects_out_of_range_window() {
        for days in [i64::MAX, 1_000_000_000] {
            let err = purge_cutoff(Utc::now(), days).unwrap_err();
            assert!(err.to_string().contains("out of range"), "unexpected error: {err}");
        }
    }
}
