//! Twitch OAuth flow (implicit grant)
//!
//! The access token comes back in the URL fragment, which browsers never
//! send to the server. The flow is therefore split in two steps:
//!
//! 1. `GET /oauth` serves a page whose only contract is to read the
//!    fragment parameter `access_token` and navigate to
//!    `/login?token=<access_token>`.
//! 2. `GET /login` resolves the token to an email, maps it to a session
//!    and sets the `SESSION_ID` cookie.
//!
//! Step 1 runs in the browser and cannot be verified server-side.

use axum::{
    Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse},
    routing::get,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use serde::Deserialize;
use serde_json::json;

use super::middleware::SESSION_COOKIE;
use crate::AppState;
use crate::error::AppError;
use crate::metrics::LOGINS_TOTAL;
use crate::templates::Page;

/// Where a successful login lands
pub const PRIVATE_AREA_PATH: &str = "/privateArea";

/// Create authentication router
///
/// Routes:
/// - GET / - Entry page with the provider login link
/// - GET /oauth - Implicit-flow callback page
/// - GET /login - Token exchange, session cookie, redirect
pub fn auth_router() -> Router<AppState> {
    Router::new()
        .route("/", get(entry_page))
        .route("/oauth", get(oauth_callback_page))
        .route("/login", get(login))
}

// =============================================================================
// Pages
// =============================================================================

/// GET /
///
/// Renders the entry page embedding the provider's authorization URL.
async fn entry_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    state.templates.render(
        Page::Index,
        &json!({ "login_url": state.identity.login_url() }),
    )
}

/// GET /oauth
///
/// Renders the callback page that forwards the fragment token to `/login`.
async fn oauth_callback_page(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    state.templates.render(
        Page::OAuthCallback,
        &json!({
            "client_id": state.config.identity.client_id,
            "app_domain": state.config.server.domain,
        }),
    )
}

// =============================================================================
// Login
// =============================================================================

/// Query parameters for `/login`
#[derive(Debug, Deserialize)]
struct LoginQuery {
    /// Access token extracted from the callback fragment
    token: Option<String>,
}

/// GET /login?token=...
///
/// # Steps
/// 1. Resolve the token to an email via the identity provider
/// 2. Reuse or mint the session for that email
/// 3. Set the `SESSION_ID` cookie (HttpOnly, short Max-Age)
/// 4. Redirect (302) to the private area
async fn login(
    State(state): State<AppState>,
    Query(query): Query<LoginQuery>,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    let token = query
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            LOGINS_TOTAL.with_label_values(&["bad_request"]).inc();
            AppError::Validation("token query parameter is required".to_string())
        })?;

    let email = match state.identity.resolve_user(token).await {
        Ok(email) => email,
        Err(error) => {
            LOGINS_TOTAL.with_label_values(&["rejected"]).inc();
            return Err(error);
        }
    };

    let session_id = match state.sessions.resolve_or_create(&email).await {
        Ok(session_id) => session_id,
        Err(error) => {
            LOGINS_TOTAL.with_label_values(&["store_error"]).inc();
            return Err(error);
        }
    };

    LOGINS_TOTAL.with_label_values(&["success"]).inc();
    tracing::info!(
        email = %email,
        session = %session_id.redacted(),
        "Login succeeded"
    );

    let jar = jar.add(build_session_cookie(
        session_id.into_string(),
        state.config.session.cookie_max_age_seconds,
    ));

    Ok((
        StatusCode::FOUND,
        jar,
        [(header::LOCATION, PRIVATE_AREA_PATH)],
    ))
}

// =============================================================================
// Helpers
// =============================================================================

/// Session cookie: HttpOnly, path `/`, fixed Max-Age
///
/// Secure and SameSite are left unset.
fn build_session_cookie(session_id: String, max_age_seconds: i64) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, session_id))
        .path("/")
        .http_only(true)
        .max_age(time::Duration::seconds(max_age_seconds))
        .build()
}
