//! Session management
//!
//! A session is an opaque random identifier mapped to the email the
//! identity provider vouched for. The mapping lives server-side behind
//! the [`SessionStore`] trait; the browser only ever holds the identifier.

use axum::async_trait;
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Utc};
use rand::RngCore;
use std::collections::BTreeMap;
use std::fmt;

use crate::error::AppError;

const SESSION_ID_BYTES: usize = 32;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(String);

impl SessionId {
    /// Mint a fresh identifier from 32 random bytes (URL-safe base64)
    pub fn generate() -> Self {
        let mut bytes = [0_u8; SESSION_ID_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(general_purpose::URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// Short prefix safe to put in logs
    pub fn redacted(&self) -> String {
        let prefix: String = self.0.chars().take(6).collect();
        format!("{prefix}…")
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-side lifetime of session records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionLifetime {
    /// Records live forever; only the cookie expires
    #[default]
    Persistent,
    /// Records stop resolving once this long has passed since creation
    Expiring(chrono::Duration),
}

impl SessionLifetime {
    /// Whether a record is still usable at `now`
    ///
    /// Under an expiring policy a record without a creation time is
    /// treated as stale. An expiry past the representable range counts
    /// as live.
    pub fn is_live(&self, record: &SessionRecord, now: DateTime<Utc>) -> bool {
        match self {
            SessionLifetime::Persistent => true,
            SessionLifetime::Expiring(ttl) => record.created_at.is_some_and(|created_at| {
                created_at
                    .checked_add_signed(*ttl)
                    .is_none_or(|expires_at| expires_at > now)
            }),
        }
    }

    /// Creation time to stamp on a new record
    ///
    /// Persistent records stay undated so the file keeps the flat layout.
    fn stamp(&self, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            SessionLifetime::Persistent => None,
            SessionLifetime::Expiring(_) => Some(now),
        }
    }
}

/// Stored session data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    /// Email as given on the first login
    pub email: String,
    /// When the record was minted, if known
    pub created_at: Option<DateTime<Utc>>,
}

/// Outcome of [`SessionTable::resolve_or_create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// An existing live record matched the email
    Existing(SessionId),
    /// A new record was inserted
    Created(SessionId),
}

impl Resolution {
    pub fn session_id(&self) -> &SessionId {
        match self {
            Resolution::Existing(id) | Resolution::Created(id) => id,
        }
    }

    pub fn into_session_id(self) -> SessionId {
        match self {
            Resolution::Existing(id) | Resolution::Created(id) => id,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Resolution::Created(_))
    }
}

/// In-memory view of the whole session mapping
///
/// Store backends load a table, apply one operation, and (for mutations)
/// write it back, all while holding their own lock.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionTable {
    records: BTreeMap<String, SessionRecord>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: BTreeMap<String, SessionRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &BTreeMap<String, SessionRecord> {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Return the live identifier for `email`, or mint one
    ///
    /// Emails compare case-insensitively. Stale records for the same email
    /// are dropped before a new one is inserted, so at most one identifier
    /// maps to any email.
    pub fn resolve_or_create(
        &mut self,
        email: &str,
        lifetime: SessionLifetime,
        now: DateTime<Utc>,
    ) -> Resolution {
        let wanted = email.to_lowercase();

        let existing = self
            .records
            .iter()
            .find(|(_, record)| {
                record.email.to_lowercase() == wanted && lifetime.is_live(record, now)
            })
            .map(|(id, _)| SessionId(id.clone()));
        if let Some(id) = existing {
            return Resolution::Existing(id);
        }

        self.records
            .retain(|_, record| record.email.to_lowercase() != wanted);

        let id = loop {
            let candidate = SessionId::generate();
            if !self.records.contains_key(candidate.as_str()) {
                break candidate;
            }
        };

        self.records.insert(
            id.0.clone(),
            SessionRecord {
                email: email.to_string(),
                created_at: lifetime.stamp(now),
            },
        );

        Resolution::Created(id)
    }

    /// Email mapped to `session_id`, if it exists and is live
    pub fn lookup(
        &self,
        session_id: &str,
        lifetime: SessionLifetime,
        now: DateTime<Utc>,
    ) -> Option<&str> {
        self.records
            .get(session_id)
            .filter(|record| lifetime.is_live(record, now))
            .map(|record| record.email.as_str())
    }
}

/// Session store interface
///
/// Production uses the JSON file store; tests and ephemeral deployments
/// use the in-memory store. Implementations serialize mutations.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Reuse the identifier already mapped to `email`, or mint a new one
    async fn resolve_or_create(&self, email: &str) -> Result<SessionId, AppError>;

    /// Email mapped to `session_id`; `None` for unknown or expired ids
    async fn lookup(&self, session_id: &str) -> Result<Option<String>, AppError>;

    /// Number of stored records
    async fn count(&self) -> Result<usize, AppError>;
}
