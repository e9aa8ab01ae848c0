//! Common test utilities for E2E tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use axum::async_trait;
use sessiongate::auth::{IdentityProvider, SessionStore};
use sessiongate::config;
use sessiongate::error::AppError;
use sessiongate::storage::{FileSessionStore, MemorySessionStore};
use sessiongate::{AppState, build_router};
use tempfile::TempDir;
use tokio::net::TcpListener;

/// Identity provider answering from a fixed token table
pub struct FakeIdentityProvider {
    users: HashMap<String, String>,
}

impl FakeIdentityProvider {
    pub fn new(users: &[(&str, &str)]) -> Self {
        Self {
            users: users
                .iter()
                .map(|(token, email)| (token.to_string(), email.to_string()))
                .collect(),
        }
    }
}

#[async_trait]
impl IdentityProvider for FakeIdentityProvider {
    fn login_url(&self) -> String {
        sessiongate::auth::build_login_url(
            &url::Url::parse("https://id.twitch.tv/oauth2/authorize").unwrap(),
            "test-client-id",
            "https://test.example.com/oauth",
            "user:read:email",
        )
    }

    async fn resolve_user(&self, access_token: &str) -> Result<String, AppError> {
        self.users
            .get(access_token)
            .cloned()
            .ok_or_else(|| AppError::AuthResolution("unknown token".to_string()))
    }
}

/// Build a test configuration rooted in `dir`
pub fn test_config(dir: &TempDir) -> config::AppConfig {
    config::AppConfig {
        server: config::ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0, // Let OS assign port
            domain: "test.example.com".to_string(),
            protocol: "https".to_string(),
        },
        identity: config::IdentityConfig {
            client_id: "test-client-id".to_string(),
            authorize_url: "https://id.twitch.tv/oauth2/authorize".to_string(),
            users_url: "https://api.twitch.tv/helix/users".to_string(),
            scope: "user:read:email".to_string(),
            timeout_seconds: 5,
        },
        session: config::SessionConfig {
            backend: config::SessionBackend::File,
            store_path: dir.path().join("sessions.json"),
            cookie_max_age_seconds: 90,
            lifetime: config::SessionLifetimeMode::Persistent,
            ttl_seconds: None,
        },
        templates: config::TemplatesConfig::default(),
        metrics: config::MetricsConfig { enabled: true },
        logging: config::LoggingConfig {
            level: "info".to_string(),
            format: config::LogFormat::Pretty,
        },
    }
}

/// Test server instance
pub struct TestServer {
    pub addr: String,
    pub state: AppState,
    pub _temp_dir: TempDir,
    pub client: reqwest::Client,
}

impl TestServer {
    /// Server backed by a file store in a temp dir and a fake provider
    /// that knows `token-a -> a@b.com` and `token-user -> user@example.com`
    pub async fn new() -> Self {
        Self::with_users(&[("token-a", "a@b.com"), ("token-user", "user@example.com")]).await
    }

    pub async fn with_users(users: &[(&str, &str)]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let config = test_config(&temp_dir);

        let sessions: Arc<dyn SessionStore> = Arc::new(
            FileSessionStore::open(&config.session.store_path, config.session.lifetime_policy())
                .await
                .unwrap(),
        );

        Self::start(temp_dir, config, sessions, users).await
    }

    /// Server backed by the in-memory store
    pub async fn in_memory(users: &[(&str, &str)]) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(&temp_dir);
        config.session.backend = config::SessionBackend::Memory;

        let sessions: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::default());
        Self::start(temp_dir, config, sessions, users).await
    }

    async fn start(
        temp_dir: TempDir,
        config: config::AppConfig,
        sessions: Arc<dyn SessionStore>,
        users: &[(&str, &str)],
    ) -> Self {
        let identity = Arc::new(FakeIdentityProvider::new(users));
        let state = AppState::with_components(config, sessions, identity).unwrap();

        // Redirects stay visible to the assertions
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap();

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let addr_str = format!("http://{}", addr);

        let app = build_router(state.clone());

        // Spawn server in background
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr: addr_str,
            state,
            _temp_dir: temp_dir,
            client,
        }
    }

    /// Get base URL for requests
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.addr, path)
    }

    /// Path of the session file
    pub fn store_path(&self) -> PathBuf {
        self.state.config.session.store_path.clone()
    }

    /// Create a session directly in the store
    pub async fn create_session(&self, email: &str) -> String {
        self.state
            .sessions
            .resolve_or_create(email)
            .await
            .unwrap()
            .into_string()
    }
}

/// Value of the `SESSION_ID` cookie set by a response, if any
pub fn session_cookie(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| value.strip_prefix("SESSION_ID="))
        .map(|rest| rest.split(';').next().unwrap_or_default().to_string())
}

/// Raw `Set-Cookie` header for `SESSION_ID`
pub fn session_set_cookie_header(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("SESSION_ID="))
        .map(ToString::to_string)
}
