//! Error types for SessionGate
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.
//! Responses never carry error details; those go to the log.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Handlers return this at the request boundary. Every variant maps
/// to a status code with an empty body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Identity provider call failed or yielded no usable email (401)
    #[error("Authentication failed: {0}")]
    AuthResolution(String),

    /// No session cookie on the request (403)
    #[error("Session cookie missing")]
    MissingSession,

    /// Session cookie present but not known to the store (403)
    #[error("Session not recognised")]
    InvalidSession,

    /// Malformed request (400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Session store read/write failed (500)
    #[error("Session store error: {0}")]
    StoreIo(String),

    /// Template registration or rendering failed (500)
    #[error("Template error: {0}")]
    Template(String),

    /// Configuration error (500)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Status code and metric label for this error
    pub fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::AuthResolution(_) => (StatusCode::UNAUTHORIZED, "auth_resolution"),
            AppError::MissingSession => (StatusCode::FORBIDDEN, "missing_session"),
            AppError::InvalidSession => (StatusCode::FORBIDDEN, "invalid_session"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation"),
            AppError::StoreIo(_) => (StatusCode::INTERNAL_SERVER_ERROR, "store_io"),
            AppError::Template(_) => (StatusCode::INTERNAL_SERVER_ERROR, "template"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<handlebars::TemplateError> for AppError {
    fn from(err: handlebars::TemplateError) -> Self {
        AppError::Template(err.to_string())
    }
}

impl From<handlebars::RenderError> for AppError {
    fn from(err: handlebars::RenderError) -> Self {
        AppError::Template(err.to_string())
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Client and access errors are logged at debug/warn level,
    /// server-side failures at error level.
    fn into_response(self) -> Response {
        let (status, error_type) = self.classify();

        if status.is_server_error() {
            tracing::error!(error = %self, error_type, "Request failed");
        } else if status == StatusCode::UNAUTHORIZED {
            tracing::warn!(error = %self, error_type, "Login rejected");
        } else {
            tracing::debug!(error = %self, error_type, "Request rejected");
        }

        // Record error metric
        use crate::metrics::ERRORS_TOTAL;
        ERRORS_TOTAL.with_label_values(&[error_type]).inc();

        status.into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
