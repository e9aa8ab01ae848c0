//! Session extraction
//!
//! Resolves the `SESSION_ID` cookie against the session store.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{HeaderMap, request::Parts},
};
use axum_extra::extract::CookieJar;

use crate::AppState;
use crate::error::AppError;
use crate::metrics::SESSION_LOOKUPS_TOTAL;

/// Name of the session cookie
pub const SESSION_COOKIE: &str = "SESSION_ID";

fn extract_session_id(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    jar.get(SESSION_COOKIE)
        .map(|cookie| cookie.value().trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Extractor for the user behind the session cookie
///
/// Rejects with `MissingSession` when no cookie is sent and
/// `InvalidSession` when the store does not know the identifier.
///
/// # Usage
/// ```ignore
/// async fn handler(CurrentUser { email }: CurrentUser) -> impl IntoResponse {
///     format!("Hello, {}", email)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub email: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        if let Some(user) = parts.extensions.get::<CurrentUser>().cloned() {
            return Ok(user);
        }

        let Some(session_id) = extract_session_id(&parts.headers) else {
            SESSION_LOOKUPS_TOTAL.with_label_values(&["missing"]).inc();
            return Err(AppError::MissingSession);
        };

        let state = AppState::from_ref(state);
        let user = match state.sessions.lookup(&session_id).await? {
            Some(email) => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
                CurrentUser { email }
            }
            None => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
                return Err(AppError::InvalidSession);
            }
        };

        parts.extensions.insert(user.clone());
        Ok(user)
    }
}
