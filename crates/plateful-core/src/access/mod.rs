//! Access control for the profile page.
//!
//! `GET /profile/{user_id}` resolves to one of three outcomes:
//! - no session: redirect to the login page
//! - the caller asked for their own profile: redirect to their settings page
//! - anyone else's profile: hand off to the profile renderer with both ids
//!
//! [`decide`] is the pure decision over an explicit session;
//! [`ProfileAccessGate`] wires it to a [`SessionResolver`] and a
//! [`ProfileRenderer`].

use async_trait::async_trait;

use crate::session::{Session, SessionError, SessionResolver};

/// Where unauthenticated callers are sent.
pub const LOGIN_PATH: &str = "/login";

/// Where callers viewing their own profile are sent.
pub const OWN_SETTINGS_PATH: &str = "/settings/social";

/// A request for the profile of `user_id`, taken from the route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileRequest {
    /// Opaque identifier; not validated here.
    pub user_id: String,
}

impl ProfileRequest {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

/// The only way access to a profile page can fail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("no active session")]
    Unauthenticated,
}

impl AccessError {
    /// Redirect target that terminates the request.
    pub fn redirect_target(&self) -> &'static str {
        match self {
            Self::Unauthenticated => LOGIN_PATH,
        }
    }
}

/// Outcome of a successful access check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// The caller requested their own profile.
    RedirectToOwnSettings,
    /// Render `user_id`'s profile for `current_user_id`.
    Render {
        user_id: String,
        current_user_id: String,
    },
}

/// Decide what a profile request should produce.
///
/// Identifiers are compared byte for byte.
pub fn decide(
    request: &ProfileRequest,
    session: Option<&Session>,
) -> Result<AccessDecision, AccessError> {
    let session = session.ok_or(AccessError::Unauthenticated)?;

    if request.user_id == session.current_user_id {
        return Ok(AccessDecision::RedirectToOwnSettings);
    }

    Ok(AccessDecision::Render {
        user_id: request.user_id.clone(),
        current_user_id: session.current_user_id.clone(),
    })
}

/// Renders another user's profile for the caller.
#[async_trait]
pub trait ProfileRenderer: Send + Sync {
    type Output: Send;

    async fn render(&self, user_id: &str, current_user_id: &str) -> Self::Output;
}

/// Result of running the gate end to end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome<T> {
    /// Terminal redirect to the given path.
    Redirect(&'static str),
    /// The renderer's output.
    Rendered(T),
}

/// Errors surfaced by [`ProfileAccessGate::handle`].
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Session-aware front door for profile pages.
pub struct ProfileAccessGate<S, R> {
    sessions: S,
    renderer: R,
}

impl<S, R> ProfileAccessGate<S, R>
where
    S: SessionResolver,
    R: ProfileRenderer,
{
    pub fn new(sessions: S, renderer: R) -> Self {
        Self { sessions, renderer }
    }

    /// Resolve the caller's session from `credential` and route the request.
    ///
    /// `Err(GateError::Access(Unauthenticated))` means redirect to
    /// [`LOGIN_PATH`]; use [`GateOutcome`] via [`Self::handle_or_redirect`]
    /// to get that redirect as a value instead.
    pub async fn handle(
        &self,
        request: &ProfileRequest,
        credential: Option<&str>,
    ) -> Result<GateOutcome<R::Output>, GateError> {
        let session = self.sessions.resolve(credential).await?;

        match decide(request, session.as_ref())? {
            AccessDecision::RedirectToOwnSettings => {
                tracing::debug!(user_id = %request.user_id, "own profile requested");
                Ok(GateOutcome::Redirect(OWN_SETTINGS_PATH))
            }
            AccessDecision::Render {
                user_id,
                current_user_id,
            } => {
                let output = self.renderer.render(&user_id, &current_user_id).await;
                Ok(GateOutcome::Rendered(output))
            }
        }
    }

    /// Like [`Self::handle`], but folds `Unauthenticated` into a redirect.
    /// Only session backend failures remain errors.
    pub async fn handle_or_redirect(
        &self,
        request: &ProfileRequest,
        credential: Option<&str>,
    ) -> Result<GateOutcome<R::Output>, SessionError> {
        match self.handle(request, credential).await {
            Ok(outcome) => Ok(outcome),
            Err(GateError::Access(err)) => {
                tracing::debug!(user_id = %request.user_id, "{err}; redirecting to login");
                Ok(GateOutcome::Redirect(err.redirect_target()))
            }
            Err(GateError::Session(err)) => Err(err),
        }
    }
}
