//! In-memory session store
//!
//! Volatile; cleared on restart. Used by tests and by deployments that
//! set `session.backend = "memory"`.

use axum::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::auth::{SessionId, SessionLifetime, SessionStore, SessionTable};
use crate::error::AppError;
use crate::metrics::{SESSIONS_CREATED_TOTAL, SESSIONS_STORED};

/// Thread-safe in-memory session store
pub struct MemorySessionStore {
    table: RwLock<SessionTable>,
    lifetime: SessionLifetime,
}

impl MemorySessionStore {
    pub fn new(lifetime: SessionLifetime) -> Self {
        Self {
            table: RwLock::new(SessionTable::new()),
            lifetime,
        }
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(SessionLifetime::Persistent)
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn resolve_or_create(&self, email: &str) -> Result<SessionId, AppError> {
        let mut table = self.table.write().await;
        let resolution = table.resolve_or_create(email, self.lifetime, Utc::now());

        if resolution.is_created() {
            SESSIONS_CREATED_TOTAL.inc();
            SESSIONS_STORED.set(table.len() as i64);
            tracing::debug!(
                email = %email,
                session = %resolution.session_id().redacted(),
                "Session created"
            );
        }

        Ok(resolution.into_session_id())
    }

    async fn lookup(&self, session_id: &str) -> Result<Option<String>, AppError> {
        let table = self.table.read().await;
        Ok(table
            .lookup(session_id, self.lifetime, Utc::now())
            .map(ToOwned::to_owned))
    }

    async fn count(&self) -> Result<usize, AppError> {
        Ok(self.table.read().await.len())
    }
}
