//! SessionGate - a private page behind Twitch login
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      HTTP Layer (Axum)                       │
//! │  - GET /            entry page with login link              │
//! │  - GET /oauth       implicit-flow callback page             │
//! │  - GET /login       token -> session cookie -> redirect     │
//! │  - GET /privateArea gated page                              │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Auth Layer                               │
//! │  - Identity provider gateway (Twitch Helix)                 │
//! │  - Session mapping (id -> email)                            │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Storage Layer                            │
//! │  - JSON session file (lock-guarded, atomic replace)         │
//! │  - In-memory store                                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - `api`: Gated page and metrics handlers
//! - `auth`: Identity provider, sessions, login flow
//! - `storage`: Session store backends
//! - `templates`: HTML page templates
//! - `config`: Configuration management
//! - `error`: Error types

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod metrics;
pub mod storage;
pub mod templates;

use std::sync::Arc;

/// Application state shared across all handlers
///
/// Cloned for each request. The store and the identity provider are
/// trait objects so tests can inject their own.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<config::AppConfig>,

    /// Session id -> email mapping
    pub sessions: Arc<dyn auth::SessionStore>,

    /// Identity provider gateway
    pub identity: Arc<dyn auth::IdentityProvider>,

    /// Compiled page templates
    pub templates: Arc<templates::Templates>,
}

impl AppState {
    /// Initialize application state
    ///
    /// # Steps
    /// 1. Open the configured session store
    /// 2. Build the Twitch identity provider
    /// 3. Compile page templates
    ///
    /// # Errors
    /// Returns error if any initialization step fails
    pub async fn new(config: config::AppConfig) -> Result<Self, error::AppError> {
        tracing::info!("Initializing application state...");

        let sessions = storage::open_session_store(&config.session).await?;
        tracing::info!(backend = ?config.session.backend, "Session store ready");

        let identity = Arc::new(auth::TwitchIdentityProvider::new(
            &config.identity,
            &config.server,
        )?);

        let state = Self::with_components(config, sessions, identity)?;
        tracing::info!("Application state initialized successfully");
        Ok(state)
    }

    /// Assemble state from already-built components
    ///
    /// Used by `new` and by tests that inject a fake provider or store.
    pub fn with_components(
        config: config::AppConfig,
        sessions: Arc<dyn auth::SessionStore>,
        identity: Arc<dyn auth::IdentityProvider>,
    ) -> Result<Self, error::AppError> {
        let templates = templates::Templates::load(config.templates.dir.as_deref())?;

        Ok(Self {
            config: Arc::new(config),
            sessions,
            identity,
            templates: Arc::new(templates),
        })
    }
}

/// Build the Axum router with all routes.
///
/// This is shared by the binary and integration tests to keep route
/// composition consistent across environments.
pub fn build_router(state: AppState) -> axum::Router {
    use axum::Router;
    use tower_http::trace::TraceLayer;

    let mut router = Router::new()
        .route("/health", axum::routing::get(health_check))
        .merge(auth::auth_router())
        .merge(api::private_area_router());

    if state.config.metrics.enabled {
        router = router.merge(api::metrics_router());
    }

    router.layer(TraceLayer::new_for_http()).with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
