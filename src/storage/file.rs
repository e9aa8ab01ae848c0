//! JSON file session store
//!
//! The whole mapping lives in one human-readable JSON object and is
//! re-read on every operation and rewritten in full on every mutation.
//! A single async mutex serializes access, and writes go to a temp file
//! in the same directory that is then renamed over the original.
//!
//! Dated records keep their `created_at` regardless of the configured
//! policy, so switching between policies never drops timestamps.

use axum::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

use crate::auth::{SessionId, SessionLifetime, SessionRecord, SessionStore, SessionTable};
use crate::error::AppError;
use crate::metrics::{SESSIONS_CREATED_TOTAL, SESSIONS_STORED};

/// On-disk value for one session
///
/// Plain strings are the flat `id -> email` layout; the object form
/// carries a creation time for the expiring lifetime policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
enum StoredEntry {
    Email(String),
    Record {
        email: String,
        created_at: DateTime<Utc>,
    },
}

impl From<StoredEntry> for SessionRecord {
    fn from(entry: StoredEntry) -> Self {
        match entry {
            StoredEntry::Email(email) => SessionRecord {
                email,
                created_at: None,
            },
            StoredEntry::Record { email, created_at } => SessionRecord {
                email,
                created_at: Some(created_at),
            },
        }
    }
}

impl From<&SessionRecord> for StoredEntry {
    fn from(record: &SessionRecord) -> Self {
        match record.created_at {
            Some(created_at) => StoredEntry::Record {
                email: record.email.clone(),
                created_at,
            },
            None => StoredEntry::Email(record.email.clone()),
        }
    }
}

/// Session store persisted to a JSON file
pub struct FileSessionStore {
    path: PathBuf,
    lifetime: SessionLifetime,
    lock: Mutex<()>,
}

impl FileSessionStore {
    /// Open the store at `path`
    ///
    /// The file does not need to exist yet; it is created on the first
    /// write. An existing file is parsed once so that a corrupt store
    /// fails startup instead of the first login.
    ///
    /// # Errors
    /// Returns `StoreIo` if the file exists but cannot be read or parsed
    pub async fn open(path: impl Into<PathBuf>, lifetime: SessionLifetime) -> Result<Self, AppError> {
        let store = Self {
            path: path.into(),
            lifetime,
            lock: Mutex::new(()),
        };

        let table = store.read_table().await?;
        SESSIONS_STORED.set(table.len() as i64);
        tracing::info!(
            path = %store.path.display(),
            sessions = table.len(),
            "Session store opened"
        );

        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_table(&self) -> Result<SessionTable, AppError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                return Ok(SessionTable::new());
            }
            Err(error) => {
                return Err(AppError::StoreIo(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    error
                )));
            }
        };

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(SessionTable::new());
        }

        let entries: BTreeMap<String, StoredEntry> =
            serde_json::from_slice(&bytes).map_err(|error| {
                AppError::StoreIo(format!("Failed to parse {}: {}", self.path.display(), error))
            })?;

        Ok(SessionTable::from_records(
            entries
                .into_iter()
                .map(|(id, entry)| (id, entry.into()))
                .collect(),
        ))
    }

    async fn write_table(&self, table: &SessionTable) -> Result<(), AppError> {
        let entries: BTreeMap<&str, StoredEntry> = table
            .records()
            .iter()
            .map(|(id, record)| (id.as_str(), StoredEntry::from(record)))
            .collect();
        let mut json = serde_json::to_vec_pretty(&entries)
            .map_err(|error| AppError::StoreIo(format!("Failed to encode sessions: {}", error)))?;
        json.push(b'\n');

        let path = self.path.clone();
        tokio::task::spawn_blocking(move || replace_file(&path, &json))
            .await
            .map_err(|error| AppError::Internal(error.into()))?
            .map_err(|error| {
                AppError::StoreIo(format!("Failed to write {}: {}", self.path.display(), error))
            })
    }
}

/// Write `contents` next to `path` and rename it into place
fn replace_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir)?;

    let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
    temp.write_all(contents)?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|error| error.error)?;
    Ok(())
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn resolve_or_create(&self, email: &str) -> Result<SessionId, AppError> {
        let _guard = self.lock.lock().await;

        let mut table = self.read_table().await?;
        let resolution = table.resolve_or_create(email, self.lifetime, Utc::now());

        if resolution.is_created() {
            self.write_table(&table).await?;
            SESSIONS_CREATED_TOTAL.inc();
            SESSIONS_STORED.set(table.len() as i64);
            tracing::info!(
                email = %email,
                session = %resolution.session_id().redacted(),
                "Session created"
            );
        }

        Ok(resolution.into_session_id())
    }

    async fn lookup(&self, session_id: &str) -> Result<Option<String>, AppError> {
        let _guard = self.lock.lock().await;

        let table = self.read_table().await?;
        Ok(table
            .lookup(session_id, self.lifetime, Utc::now())
            .map(ToOwned::to_owned))
    }

    async fn count(&self) -> Result<usize, AppError> {
        let _guard = self.lock.lock().await;
        Ok(self.read_table().await?.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join("data").join("sessions.json")
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_store() {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::open(store_path(&dir), SessionLifetime::Persistent)
            .await
            .unwrap();

        assert_eq!(store.count().await.unwrap(), 0);
        assert_eq!(store.lookup("anything").await.unwrap(), None);
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn sessions_survive_reopening() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        let id = {
            let store = FileSessionStore::open(&path, SessionLifetime::Persistent)
                .await
                .unwrap();
            store.resolve_or_create("a@b.com").await.unwrap()
        };

        let reopened = FileSessionStore::open(&path, SessionLifetime::Persistent)
            .await
            .unwrap();
        assert_eq!(
            reopened.lookup(id.as_str()).await.unwrap().as_deref(),
            Some("a@b.com")
        );
        assert_eq!(reopened.resolve_or_create("A@B.COM").await.unwrap(), id);
    }

    #[tokio::test]
    async fn persistent_policy_writes_flat_mapping() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let store = FileSessionStore::open(&path, SessionLifetime::Persistent)
            .await
            .unwrap();

        let id = store.resolve_or_create("user@example.com").await.unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(
            value,
            serde_json::json!({ id.as_str(): "user@example.com" })
        );
    }

    #[tokio::test]
    async fn expiring_policy_writes_creation_time() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let store = FileSessionStore::open(
            &path,
            SessionLifetime::Expiring(chrono::Duration::hours(1)),
        )
        .await
        .unwrap();

        let id = store.resolve_or_create("user@example.com").await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value[id.as_str()]["email"], "user@example.com");
        assert!(value[id.as_str()]["created_at"].is_string());
    }

    #[tokio::test]
    async fn loads_legacy_flat_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"{
  "0f8fad5b-d9cb-469f-a165-70867728950e": "Someone@Example.com"
}"#,
        )
        .unwrap();

        let store = FileSessionStore::open(&path, SessionLifetime::Persistent)
            .await
            .unwrap();

        assert_eq!(
            store
                .lookup("0f8fad5b-d9cb-469f-a165-70867728950e")
                .await
                .unwrap()
                .as_deref(),
            Some("Someone@Example.com")
        );
        assert_eq!(
            store
                .resolve_or_create("someone@example.com")
                .await
                .unwrap()
                .as_str(),
            "0f8fad5b-d9cb-469f-a165-70867728950e"
        );
    }

    #[tokio::test]
    async fn persistent_policy_keeps_existing_timestamps() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(
            &path,
            r#"{
  "dated": { "email": "old@example.com", "created_at": "2024-01-01T00:00:00Z" }
}"#,
        )
        .unwrap();

        let store = FileSessionStore::open(&path, SessionLifetime::Persistent)
            .await
            .unwrap();
        let id = store.resolve_or_create("new@example.com").await.unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["dated"]["email"], "old@example.com");
        assert_eq!(value["dated"]["created_at"], "2024-01-01T00:00:00Z");
        assert_eq!(value[id.as_str()], "new@example.com");
    }

    #[tokio::test]
    async fn corrupt_file_fails_to_open() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sessions.json");
        std::fs::write(&path, "{ not json").unwrap();

        let error = FileSessionStore::open(&path, SessionLifetime::Persistent)
            .await
            .err()
            .expect("corrupt store must be rejected");
        assert!(matches!(error, AppError::StoreIo(_)));
    }

    #[tokio::test]
    async fn concurrent_creations_lose_no_insertions() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(
            FileSessionStore::open(store_path(&dir), SessionLifetime::Persistent)
                .await
                .unwrap(),
        );

        let handles: Vec<_> = (0..16)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move {
                    store
                        .resolve_or_create(&format!("user{i}@example.com"))
                        .await
                        .unwrap()
                })
            })
            .collect();

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();

        assert_eq!(ids.len(), 16);
        assert_eq!(store.count().await.unwrap(), 16);
        for i in 0..16 {
            let email = format!("user{i}@example.com");
            let id = store.resolve_or_create(&email).await.unwrap();
            assert_eq!(store.lookup(id.as_str()).await.unwrap(), Some(email));
        }
        assert_eq!(store.count().await.unwrap(), 16);
    }
}
