//! Identity provider gateway
//!
//! Builds the implicit-flow authorization URL and turns an access token
//! into the email of the account that granted it.

use axum::async_trait;
use serde::Deserialize;
use url::Url;

use crate::config::{IdentityConfig, ServerConfig};
use crate::error::AppError;
use crate::metrics::IDENTITY_REQUEST_DURATION_SECONDS;

/// Resolves access tokens to user identities
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// URL the browser is sent to for consent
    fn login_url(&self) -> String;

    /// Email of the user behind `access_token`
    ///
    /// # Errors
    /// `AuthResolution` for any failure: transport, timeout, non-2xx,
    /// undecodable body, no user record, or no email on the record.
    async fn resolve_user(&self, access_token: &str) -> Result<String, AppError>;
}

/// Build an implicit-flow authorization URL
///
/// Query: client_id, redirect_uri, response_type=token, scope,
/// force_verify=true (always re-prompt for consent).
pub fn build_login_url(
    authorize_url: &Url,
    client_id: &str,
    redirect_uri: &str,
    scope: &str,
) -> String {
    let mut url = authorize_url.clone();
    url.query_pairs_mut()
        .append_pair("client_id", client_id)
        .append_pair("redirect_uri", redirect_uri)
        .append_pair("response_type", "token")
        .append_pair("scope", scope)
        .append_pair("force_verify", "true");
    url.to_string()
}

/// Helix `GET /users` response
#[derive(Debug, Deserialize)]
struct HelixUsersResponse {
    #[serde(default)]
    data: Vec<HelixUser>,
}

/// Helix user record (only the fields we read)
#[derive(Debug, Deserialize)]
struct HelixUser {
    #[serde(default)]
    login: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

/// Twitch identity provider
pub struct TwitchIdentityProvider {
    client_id: String,
    authorize_url: Url,
    users_url: Url,
    redirect_uri: String,
    scope: String,
    http_client: reqwest::Client,
}

impl TwitchIdentityProvider {
    /// Create provider from configuration
    ///
    /// # Errors
    /// Returns `Config` if an endpoint URL is invalid, `Internal` if the
    /// HTTP client cannot be built
    pub fn new(identity: &IdentityConfig, server: &ServerConfig) -> Result<Self, AppError> {
        let authorize_url = Url::parse(&identity.authorize_url)
            .map_err(|e| AppError::Config(format!("identity.authorize_url: {e}")))?;
        let users_url = Url::parse(&identity.users_url)
            .map_err(|e| AppError::Config(format!("identity.users_url: {e}")))?;

        let http_client = reqwest::Client::builder()
            .user_agent(concat!("SessionGate/", env!("CARGO_PKG_VERSION")))
            .timeout(identity.timeout())
            .build()
            .map_err(|e| AppError::Internal(e.into()))?;

        Ok(Self {
            client_id: identity.client_id.clone(),
            authorize_url,
            users_url,
            redirect_uri: server.oauth_redirect_uri(),
            scope: identity.scope.clone(),
            http_client,
        })
    }
}

#[async_trait]
impl IdentityProvider for TwitchIdentityProvider {
    fn login_url(&self) -> String {
        build_login_url(
            &self.authorize_url,
            &self.client_id,
            &self.redirect_uri,
            &self.scope,
        )
    }

    async fn resolve_user(&self, access_token: &str) -> Result<String, AppError> {
        let access_token = access_token.trim();
        if access_token.is_empty() {
            return Err(AppError::AuthResolution("empty access token".to_string()));
        }

        let timer = IDENTITY_REQUEST_DURATION_SECONDS.start_timer();
        let result = self
            .http_client
            .get(self.users_url.clone())
            .bearer_auth(access_token)
            .header("Client-Id", &self.client_id)
            .send()
            .await;
        timer.observe_duration();

        let response = result.map_err(|e| {
            if e.is_timeout() {
                AppError::AuthResolution("user-info request timed out".to_string())
            } else {
                AppError::AuthResolution(format!("user-info request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::AuthResolution(format!(
                "user-info endpoint returned {status}"
            )));
        }

        let body: HelixUsersResponse = response
            .json()
            .await
            .map_err(|e| AppError::AuthResolution(format!("invalid user-info body: {e}")))?;

        let user = body
            .data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::AuthResolution("no user record returned".to_string()))?;

        let email = user
            .email
            .map(|email| email.trim().to_string())
            .filter(|email| !email.is_empty())
            .ok_or_else(|| {
                AppError::AuthResolution(format!(
                    "user {} has no email; is the user:read:email scope granted?",
                    user.login.as_deref().unwrap_or("<unknown>")
                ))
            })?;

        tracing::debug!(email = %email, "Resolved identity");
        Ok(email)
    }
}
