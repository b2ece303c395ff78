//! Signed session tokens and session resolution.
//!
//! A session token is the cookie value that names a row in the `sessions`
//! table. Tokens are HMAC-SHA256 signed so a forged or edited cookie is
//! rejected before any database lookup.
//! Format: `plateful_st_<session_id>_<hmac_hex>`

pub mod resolver;

pub use resolver::{PgSessionResolver, SessionError, SessionResolver, open_session};

use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Token prefix used to identify plateful session tokens.
const TOKEN_PREFIX: &str = "plateful_st_";

/// Name of the cookie carrying the session token.
pub const SESSION_COOKIE: &str = "plateful_session";

/// Environment variable holding the hex-encoded signing secret.
pub const SESSION_SECRET_ENV: &str = "PLATEFUL_SESSION_SECRET";

/// Errors that can occur while parsing or verifying a session token.
#[derive(Debug, thiserror::Error)]
pub enum SessionTokenError {
    #[error("invalid session token format: {0}")]
    InvalidFormat(String),

    #[error("invalid session ID in token: {0}")]
    InvalidSessionId(String),

    #[error("session token HMAC verification failed")]
    HmacMismatch,
}

/// The authenticated caller for the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque identifier of the signed-in user.
    pub current_user_id: String,
}

impl Session {
    pub fn new(current_user_id: impl Into<String>) -> Self {
        Self {
            current_user_id: current_user_id.into(),
        }
    }
}

/// Signing and lifetime settings for session tokens.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// The HMAC secret key bytes.
    pub secret: Vec<u8>,
    /// How long a newly opened session stays valid.
    pub ttl: Duration,
}

impl SessionConfig {
    /// Lifetime applied when none is configured.
    pub const DEFAULT_TTL_HOURS: i64 = 24 * 7;

    pub fn new(secret: Vec<u8>) -> Self {
        Self {
            secret,
            ttl: Duration::hours(Self::DEFAULT_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Expiry of a session opened at `now`, or `None` if it would fall
    /// outside the representable calendar.
    pub fn expires_at(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        now.checked_add_signed(self.ttl)
    }
}

/// Sign a session ID into a cookie-safe token.
pub fn generate_session_token(config: &SessionConfig, session_id: Uuid) -> String {
    let mac = compute_hmac(&config.secret, signing_message(session_id).as_bytes());
    format!("{TOKEN_PREFIX}{session_id}_{}", hex::encode(mac))
}

/// Verify a session token and return the session ID it names.
///
/// This only proves the token was issued by this server. Whether the
/// session is still live is a database question; see [`PgSessionResolver`].
pub fn validate_session_token(
    config: &SessionConfig,
    token: &str,
) -> Result<Uuid, SessionTokenError> {
    let rest = token.strip_prefix(TOKEN_PREFIX).ok_or_else(|| {
        SessionTokenError::InvalidFormat(format!("token must start with '{TOKEN_PREFIX}'"))
    })?;

    let (id_str, hmac_hex) = rest.split_once('_').ok_or_else(|| {
        SessionTokenError::InvalidFormat("expected underscore between session id and hmac".into())
    })?;

    let session_id =
        Uuid::parse_str(id_str).map_err(|e| SessionTokenError::InvalidSessionId(e.to_string()))?;

    let provided_mac = hex::decode(hmac_hex)
        .map_err(|e| SessionTokenError::InvalidFormat(format!("invalid hex in hmac: {e}")))?;

    verify_hmac_constant_time(
        &config.secret,
        signing_message(session_id).as_bytes(),
        &provided_mac,
    )?;

    Ok(session_id)
}

/// Pull the session token out of a `Cookie` request header value.
pub fn session_cookie_value(cookie_header: &str) -> Option<&str> {
    cookie_header
        .split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim_matches('"'))
        .filter(|value| !value.is_empty())
}

/// `Set-Cookie` value that stores `token` for `max_age`.
pub fn session_set_cookie(token: &str, max_age: Duration) -> String {
    format!(
        "{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        max_age.num_seconds().max(0)
    )
}

/// `Set-Cookie` value that clears the session cookie.
pub fn session_clear_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

fn signing_message(session_id: Uuid) -> String {
    format!("session:{session_id}")
}

fn compute_hmac(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn verify_hmac_constant_time(
    key: &[u8],
    message: &[u8],
    expected_mac: &[u8],
) -> Result<(), SessionTokenError> {
    let mut mac = HmacSha256::new_from_slice(key).expect("HMAC can take key of any size");
    mac.update(message);
    mac.verify_slice(expected_mac)
        .map_err(|_| SessionTokenError::HmacMismatch)
}
