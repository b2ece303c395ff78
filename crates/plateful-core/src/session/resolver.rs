//! Session resolution: turning a request credential into a [`Session`].

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use plateful_db::models::SessionRecord;
use plateful_db::queries::sessions as session_db;

use super::{Session, SessionConfig, generate_session_token, validate_session_token};

/// Failure of the session backend itself.
///
/// An absent or invalid credential is not an error; it resolves to `None`.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("session lookup failed: {0:#}")]
    Backend(#[from] anyhow::Error),
}

/// Resolves the caller's session for a request.
#[async_trait]
pub trait SessionResolver: Send + Sync {
    /// Resolve `credential` (the raw session cookie value, if any).
    ///
    /// Returns `Ok(None)` when the caller is not authenticated.
    async fn resolve(&self, credential: Option<&str>) -> Result<Option<Session>, SessionError>;
}

/// [`SessionResolver`] backed by signed tokens and the `sessions` table.
#[derive(Debug, Clone)]
pub struct PgSessionResolver {
    pool: PgPool,
    config: SessionConfig,
}

impl PgSessionResolver {
    pub fn new(pool: PgPool, config: SessionConfig) -> Self {
        Self { pool, config }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[async_trait]
impl SessionResolver for PgSessionResolver {
    async fn resolve(&self, credential: Option<&str>) -> Result<Option<Session>, SessionError> {
        let Some(token) = credential else {
            return Ok(None);
        };

        let session_id = match validate_session_token(&self.config, token) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!(error = %e, "rejecting session cookie");
                return Ok(None);
            }
        };

        let record = session_db::get_live_session(&self.pool, session_id).await?;
        match record {
            Some(record) => Ok(Some(Session::new(record.user_id.to_string()))),
            None => {
                tracing::debug!(%session_id, "session is unknown, expired or revoked");
                Ok(None)
            }
        }
    }
}

/// Open a new session for `user_id` and return its row and signed token.
pub async fn open_session(
    pool: &PgPool,
    config: &SessionConfig,
    user_id: Uuid,
) -> anyhow::Result<(SessionRecord, String)> {
    let expires_at = config
        .expires_at(Utc::now())
        .context("session lifetime is out of range")?;
    let record = session_db::insert_session(pool, user_id, expires_at).await?;
    let token = generate_session_token(config, record.id);
    tracing::info!(session_id = %record.id, %user_id, %expires_at, "session opened");
    Ok((record, token))
}
