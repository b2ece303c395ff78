use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use sqlx::PgPool;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use plateful_core::access::{
    GateOutcome, LOGIN_PATH, ProfileAccessGate, ProfileRenderer, ProfileRequest,
};
use plateful_core::preferences::{self, MealPreferencesInput};
use plateful_core::session::{
    PgSessionResolver, Session, SessionConfig, SessionError, SessionResolver,
    session_clear_cookie, session_cookie_value, validate_session_token,
};
use plateful_db::models::User;
use plateful_db::queries::{preferences as prefs_db, sessions as session_db, users as user_db};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

pub struct AppError {
    status: StatusCode,
    message: String,
}

impl AppError {
    pub fn unauthorized() -> Self {
        Self {
            status: StatusCode::UNAUTHORIZED,
            message: "not signed in".to_string(),
        }
    }

    pub fn unprocessable(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.into(),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        tracing::error!(error = %format!("{err:#}"), "request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: format!("{err:#}"),
        }
    }

    pub fn session(err: SessionError) -> Self {
        Self::internal(anyhow::Error::new(err))
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

type ProfileGate = ProfileAccessGate<PgSessionResolver, HtmlProfileRenderer>;

#[derive(Clone)]
pub struct AppState {
    pool: PgPool,
    sessions: Arc<PgSessionResolver>,
    profile_gate: Arc<ProfileGate>,
}

impl AppState {
    pub fn new(pool: PgPool, session_config: SessionConfig) -> Self {
        let resolver = PgSessionResolver::new(pool.clone(), session_config);
        let profile_gate = ProfileAccessGate::new(
            resolver.clone(),
            HtmlProfileRenderer {
                pool: pool.clone(),
            },
        );
        Self {
            pool,
            sessions: Arc::new(resolver),
            profile_gate: Arc::new(profile_gate),
        }
    }

    async fn current_session(&self, headers: &HeaderMap) -> Result<Option<Session>, AppError> {
        self.sessions
            .resolve(session_credential(headers))
            .await
            .map_err(AppError::session)
    }

    /// The signed-in user's row, or `None` when there is no usable session.
    async fn current_user(&self, headers: &HeaderMap) -> Result<Option<User>, AppError> {
        let Some(session) = self.current_session(headers).await? else {
            return Ok(None);
        };
        let Ok(id) = Uuid::parse_str(&session.current_user_id) else {
            return Ok(None);
        };
        user_db::get_user(&self.pool, id)
            .await
            .map_err(AppError::internal)
    }
}

/// The session cookie value from the request, if any.
fn session_credential(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(session_cookie_value)
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub fn build_router(pool: PgPool, session_config: SessionConfig) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/community") }))
        .route("/healthz", get(|| async { "ok" }))
        .route("/login", get(login_page))
        .route("/logout", post(logout))
        .route("/community", get(community_page))
        .route("/profile/{user_id}", get(profile_page))
        .route("/settings/social", get(settings_page))
        .route(
            "/api/settings/preferences",
            get(get_preferences).put(put_preferences),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(AppState::new(pool, session_config))
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

pub async fn run_serve(
    pool: PgPool,
    session_config: SessionConfig,
    bind: &str,
    port: u16,
) -> Result<()> {
    let app = build_router(pool, session_config);
    let addr: SocketAddr = format!("{bind}:{port}").parse()?;
    tracing::info!("plateful serve listening on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("plateful serve shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

// ---------------------------------------------------------------------------
// Profile rendering
// ---------------------------------------------------------------------------

/// Renders another member's profile as HTML.
///
/// Ids that are not UUIDs or name no user get a 404 page.
pub struct HtmlProfileRenderer {
    pool: PgPool,
}

#[async_trait]
impl ProfileRenderer for HtmlProfileRenderer {
    type Output = Response;

    async fn render(&self, user_id: &str, current_user_id: &str) -> Response {
        let Ok(id) = Uuid::parse_str(user_id) else {
            return not_found_page(user_id);
        };

        match user_db::get_user(&self.pool, id).await {
            Ok(Some(user)) => {
                tracing::debug!(%user_id, %current_user_id, "rendering profile");
                let bio = user
                    .bio
                    .as_deref()
                    .map(|b| format!("<p>{}</p>", escape_html(b)))
                    .unwrap_or_default();
                page(
                    &user.display_name,
                    &format!(
                        "<h1>{name}</h1><p>@{handle}</p>{bio}\
<p><a href=\"/community\">Back to community</a></p>",
                        name = escape_html(&user.display_name),
                        handle = escape_html(&user.handle),
                    ),
                )
                .into_response()
            }
            Ok(None) => not_found_page(user_id),
            Err(e) => AppError::internal(e).into_response(),
        }
    }
}

fn not_found_page(user_id: &str) -> Response {
    tracing::debug!(%user_id, "profile not found");
    (
        StatusCode::NOT_FOUND,
        page(
            "Not found",
            "<h1>Profile not found</h1><p><a href=\"/community\">Back to community</a></p>",
        ),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn profile_page(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let request = ProfileRequest::new(user_id);
    let outcome = state
        .profile_gate
        .handle_or_redirect(&request, session_credential(&headers))
        .await
        .map_err(AppError::session)?;

    Ok(match outcome {
        GateOutcome::Redirect(to) => Redirect::to(to).into_response(),
        GateOutcome::Rendered(response) => response,
    })
}

async fn login_page() -> Html<String> {
    page(
        "Log in",
        "<h1>Log in</h1><p>Sign in with your account provider to continue.</p>",
    )
}

async fn logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let session_id = session_credential(&headers)
        .and_then(|token| validate_session_token(state.sessions.config(), token).ok());
    if let Some(session_id) = session_id {
        let revoked = session_db::revoke_session(&state.pool, session_id)
            .await
            .map_err(AppError::internal)?;
        if revoked {
            tracing::info!(%session_id, "session revoked by logout");
        }
    }

    Ok((
        [(header::SET_COOKIE, session_clear_cookie())],
        Redirect::to(LOGIN_PATH),
    )
        .into_response())
}

async fn community_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(me) = state.current_user(&headers).await? else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    let users = user_db::list_users(&state.pool)
        .await
        .map_err(AppError::internal)?;

    let rows = users
        .iter()
        .map(|u| {
            let you = if u.id == me.id { " (you)" } else { "" };
            format!(
                "<li><a href=\"/profile/{id}\">{name}</a> @{handle}{you}</li>",
                id = u.id,
                name = escape_html(&u.display_name),
                handle = escape_html(&u.handle),
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    Ok(page(
        "Community",
        &format!("<h1>Community</h1><ul>{rows}</ul>"),
    )
    .into_response())
}

async fn settings_page(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let Some(me) = state.current_user(&headers).await? else {
        return Ok(Redirect::to(LOGIN_PATH).into_response());
    };

    let stored = prefs_db::get_preferences(&state.pool, me.id)
        .await
        .map_err(AppError::internal)?;
    let prefs = preferences::effective(stored.as_ref());
    let quick = if prefs.quick_cook { "on" } else { "off" };

    Ok(page(
        "Your profile",
        &format!(
            "<h1>{name}</h1><p>@{handle}</p>\
<h2>Meal planning</h2>\
<ul><li>Meals per day: {meals}</li><li>Max prep time: {prep} min</li><li>Quick cook: {quick}</li></ul>\
<form method=\"post\" action=\"/logout\"><button>Log out</button></form>",
            name = escape_html(&me.display_name),
            handle = escape_html(&me.handle),
            meals = prefs.meals_per_day,
            prep = prefs.max_prep_minutes,
        ),
    )
    .into_response())
}

async fn get_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MealPreferencesInput>, AppError> {
    let me = state
        .current_user(&headers)
        .await?
        .ok_or_else(AppError::unauthorized)?;

    let stored = prefs_db::get_preferences(&state.pool, me.id)
        .await
        .map_err(AppError::internal)?;
    Ok(Json(preferences::effective(stored.as_ref())))
}

async fn put_preferences(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<MealPreferencesInput>, JsonRejection>,
) -> Result<Json<MealPreferencesInput>, AppError> {
    let me = state
        .current_user(&headers)
        .await?
        .ok_or_else(AppError::unauthorized)?;
    // Body problems are only reported to signed-in callers.
    let Json(input) = body?;

    input
        .validate()
        .map_err(|e| AppError::unprocessable(e.to_string()))?;

    let saved = prefs_db::upsert_preferences(
        &state.pool,
        me.id,
        input.meals_per_day,
        input.max_prep_minutes,
        input.quick_cook,
    )
    .await
    .map_err(AppError::internal)?;
    tracing::info!(user_id = %me.id, "meal preferences updated");

    Ok(Json(MealPreferencesInput::from(&saved)))
}

// ---------------------------------------------------------------------------
// HTML helpers
// ---------------------------------------------------------------------------

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!DOCTYPE html>\
<html><head><title>{title} | plateful</title></head><body>{body}</body></html>",
        title = escape_html(title),
    ))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
