//! Session contract: per-conversation history.
//!
//! A session is keyed by `"<channel>:<chat_id>"` and holds an append-only list
//! of role-tagged entries. The agent loop appends one user entry and one
//! assistant entry per processed turn, then saves. Storage backends live in
//! `nanoclaw-sessions`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::message::{Message, Role};

/// One persisted conversation entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// A conversation's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub key: String,
    pub entries: Vec<HistoryEntry>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            key: key.into(),
            entries: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append an entry.
    pub fn add_message(&mut self, role: Role, content: impl Into<String>) {
        let now = Utc::now();
        self.entries.push(HistoryEntry {
            role,
            content: content.into(),
            timestamp: now,
        });
        self.updated_at = now;
    }

    /// The most recent `limit` entries as provider messages, oldest first.
    pub fn history(&self, limit: usize) -> Vec<Message> {
        let start = self.entries.len().saturating_sub(limit);
        self.entries[start..]
            .iter()
            .map(|entry| {
                let mut msg = match entry.role {
                    Role::User => Message::user(&entry.content),
                    Role::Assistant => Message::assistant(&entry.content),
                    Role::System => Message::system(&entry.content),
                    Role::Tool => Message::tool_result("", "", &entry.content),
                };
                msg.timestamp = entry.timestamp;
                msg
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Session persistence.
///
/// `get_or_create` never fails for a missing session; it hands back an empty
/// one. Only the agent loop mutates sessions, so stores need no merge logic.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Backend name for diagnostics (e.g. "file", "memory").
    fn name(&self) -> &str;

    /// Load the session for `key`, or a fresh empty one.
    async fn get_or_create(&self, key: &str) -> std::result::Result<Session, SessionError>;

    /// Persist the whole session.
    async fn save(&self, session: &Session) -> std::result::Result<(), SessionError>;

    /// Keys of all known sessions.
    async fn list_keys(&self) -> std::result::Result<Vec<String>, SessionError>;
}
