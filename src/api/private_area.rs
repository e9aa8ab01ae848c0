//! Gated page

use axum::{Router, extract::State, response::Html, routing::get};
use serde_json::json;

use crate::AppState;
use crate::auth::{CurrentUser, PRIVATE_AREA_PATH};
use crate::error::AppError;
use crate::templates::Page;

/// Create private area router
///
/// Routes:
/// - GET /privateArea
pub fn private_area_router() -> Router<AppState> {
    Router::new().route(PRIVATE_AREA_PATH, get(private_area))
}

/// GET /privateArea
///
/// The session is re-validated against the store on every load.
/// Missing or unknown sessions are rejected by the `CurrentUser`
/// extractor with 403 and an empty body.
async fn private_area(
    State(state): State<AppState>,
    CurrentUser { email }: CurrentUser,
) -> Result<Html<String>, AppError> {
    state
        .templates
        .render(Page::PrivateArea, &json!({ "email": email }))
}
