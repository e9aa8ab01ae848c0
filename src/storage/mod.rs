//! Session store backends
//!
//! Handles:
//! - JSON file persistence (default)
//! - Volatile in-memory storage

mod file;
mod memory;

pub use file::FileSessionStore;
pub use memory::MemorySessionStore;

use std::sync::Arc;

use crate::auth::SessionStore;
use crate::config::{SessionBackend, SessionConfig};
use crate::error::AppError;

/// Build the store selected by `session.backend`
pub async fn open_session_store(config: &SessionConfig) -> Result<Arc<dyn SessionStore>, AppError> {
    let lifetime = config.lifetime_policy();

    let store: Arc<dyn SessionStore> = match config.backend {
        SessionBackend::File => Arc::new(FileSessionStore::open(&config.store_path, lifetime).await?),
        SessionBackend::Memory => {
            tracing::warn!("Using in-memory session store; sessions are lost on restart");
            Arc::new(MemorySessionStore::new(lifetime))
        }
    };

    Ok(store)
}
