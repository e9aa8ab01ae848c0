//! Twitch OAuth authentication
//!
//! Handles:
//! - Identity provider gateway (login URL, token -> email)
//! - Server-side session mapping
//! - Session cookie extraction
//! - Login flow routes

pub mod identity;
mod middleware;
mod oauth;
pub mod session;

pub use identity::{IdentityProvider, TwitchIdentityProvider, build_login_url};
pub use middleware::{CurrentUser, SESSION_COOKIE};
pub use oauth::{PRIVATE_AREA_PATH, auth_router};
pub use session::{
    Resolution, SessionId, SessionLifetime, SessionRecord, SessionStore, SessionTable,
};
