//! Configuration management
//!
//! Loads configuration from:
//! 1. Default values
//! 2. Configuration files (config/default.toml, config/local.toml)
//! 3. Environment variables (override)

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub identity: IdentityConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub templates: TemplatesConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0")
    pub host: String,
    /// Port number (e.g., 3000)
    pub port: u16,
    /// Public domain the provider redirects back to (e.g., "gate.example.com")
    pub domain: String,
    /// Protocol ("http" or "https")
    pub protocol: String,
}

impl ServerConfig {
    /// Get the base URL for the application
    ///
    /// # Returns
    /// Full URL like "https://gate.example.com"
    pub fn base_url(&self) -> String {
        format!("{}://{}", self.protocol, self.domain)
    }

    /// Where the provider sends the browser after consent
    pub fn oauth_redirect_uri(&self) -> String {
        format!("{}/oauth", self.base_url())
    }
}

/// Identity provider configuration (Twitch OAuth, implicit flow)
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// OAuth client identifier registered with the provider
    pub client_id: String,
    /// Authorization endpoint
    pub authorize_url: String,
    /// User-info endpoint, called with the access token as bearer
    pub users_url: String,
    /// Requested scope
    pub scope: String,
    /// Timeout for the user-info call in seconds
    pub timeout_seconds: u64,
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// Session store backend selector
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    File,
    Memory,
}

/// Server-side session lifetime policy
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SessionLifetimeMode {
    /// Records never expire on the server
    #[default]
    Persistent,
    /// Records expire `ttl_seconds` after creation
    Expiring,
}

/// Upper bound for `session.ttl_seconds` (100 years)
pub const MAX_TTL_SECONDS: u64 = 100 * 365 * 24 * 60 * 60;

/// Session configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    #[serde(default)]
    pub backend: SessionBackend,
    /// Path of the JSON session file (file backend only)
    pub store_path: PathBuf,
    /// Max-Age of the SESSION_ID cookie in seconds
    pub cookie_max_age_seconds: i64,
    #[serde(default)]
    pub lifetime: SessionLifetimeMode,
    /// Server-side record lifetime (expiring policy only)
    pub ttl_seconds: Option<u64>,
}

impl SessionConfig {
    /// Resolve the configured lifetime policy
    ///
    /// TTLs above [`MAX_TTL_SECONDS`] are clamped to it.
    pub fn lifetime_policy(&self) -> crate::auth::SessionLifetime {
        match (self.lifetime, self.ttl_seconds) {
            (SessionLifetimeMode::Expiring, Some(ttl)) => {
                let seconds = ttl.min(MAX_TTL_SECONDS) as i64;
                crate::auth::SessionLifetime::Expiring(chrono::TimeDelta::seconds(seconds))
            }
            _ => crate::auth::SessionLifetime::Persistent,
        }
    }
}

/// Template overrides
#[derive(Debug, Clone, Deserialize, Default)]
pub struct TemplatesConfig {
    /// Directory holding index.hbs, oauth.hbs and private_area.hbs
    pub dir: Option<PathBuf>,
}

/// Metrics endpoint configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MetricsConfig {
    /// Expose GET /metrics
    #[serde(default)]
    pub enabled: bool,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub fn filter_directive(&self) -> String {
        format!("sessiongate={},tower_http=debug", self.level)
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// # Loading Order
    /// 1. Default values
    /// 2. config/default.toml (if exists)
    /// 3. config/local.toml (if exists)
    /// 4. Environment variables (SESSIONGATE__*)
    /// 5. Flat variables `PORT`, `TWITCH_CLIENT_ID`, `APP_DOMAIN`
    ///
    /// # Errors
    /// Returns error if configuration is invalid
    pub fn load() -> Result<Self, crate::error::AppError> {
        use config::{Config, Environment, File};

        let config = Config::builder()
            // Start with default values
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 3000)?
            .set_default("server.protocol", "https")?
            .set_default("identity.authorize_url", "https://id.twitch.tv/oauth2/authorize")?
            .set_default("identity.users_url", "https://api.twitch.tv/helix/users")?
            .set_default("identity.scope", "user:read:email")?
            .set_default("identity.timeout_seconds", 10)?
            .set_default("session.backend", "file")?
            .set_default("session.store_path", "data/sessions.json")?
            .set_default("session.cookie_max_age_seconds", 90)?
            .set_default("session.lifetime", "persistent")?
            .set_default("metrics.enabled", false)?
            .set_default("logging.level", "info")?
            .set_default("logging.format", "pretty")?
            // Load from config/default.toml if it exists
            .add_source(File::with_name("config/default").required(false))
            // Load from config/local.toml if it exists (overrides default)
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables (SESSIONGATE__*)
            .add_source(
                Environment::with_prefix("SESSIONGATE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.port", flat_env("PORT"))?
            .set_override_option("identity.client_id", flat_env("TWITCH_CLIENT_ID"))?
            .set_override_option("server.domain", flat_env("APP_DOMAIN"))?
            .build()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;

        let app_config: Self = config
            .try_deserialize()
            .map_err(|e| crate::error::AppError::Config(e.to_string()))?;
        app_config.validate()?;
        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), crate::error::AppError> {
        use crate::error::AppError;

        if self.identity.client_id.trim().is_empty() {
            return Err(AppError::Config(
                "identity.client_id must not be empty".to_string(),
            ));
        }

        if self.server.domain.trim().is_empty() {
            return Err(AppError::Config(
                "server.domain must not be empty".to_string(),
            ));
        }

        for (key, value) in [
            ("identity.authorize_url", &self.identity.authorize_url),
            ("identity.users_url", &self.identity.users_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::Config(format!("{key} is not a valid URL: {e}")))?;
        }

        if self.identity.timeout_seconds == 0 {
            return Err(AppError::Config(
                "identity.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if self.session.cookie_max_age_seconds <= 0 {
            return Err(AppError::Config(
                "session.cookie_max_age_seconds must be greater than 0".to_string(),
            ));
        }

        if self.session.ttl_seconds.is_some_and(|ttl| ttl > MAX_TTL_SECONDS) {
            return Err(AppError::Config(format!(
                "session.ttl_seconds must not exceed {MAX_TTL_SECONDS}"
            )));
        }

        if self.session.lifetime == SessionLifetimeMode::Expiring
            && !matches!(self.session.ttl_seconds, Some(ttl) if ttl > 0)
        {
            return Err(AppError::Config(
                "session.ttl_seconds must be greater than 0 when session.lifetime=expiring"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn flat_env(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
