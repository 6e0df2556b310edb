//! File-based session store: one JSON-lines file per conversation.
//!
//! Layout of `<dir>/<percent-encoded key>.jsonl`:
//!
//! ```text
//! {"_type":"metadata","key":"telegram:555","created_at":"...","updated_at":"..."}
//! {"role":"user","content":"hi","timestamp":"..."}
//! {"role":"assistant","content":"hello","timestamp":"..."}
//! ```
//!
//! Sessions are cached in memory after the first load and the whole file is
//! rewritten on every save.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use nanoclaw_core::error::SessionError;
use nanoclaw_core::session::{HistoryEntry, Session, SessionStore};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct MetadataLine {
    #[serde(rename = "_type")]
    kind: String,
    key: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

const METADATA_KIND: &str = "metadata";

pub struct FileSessionStore {
    dir: PathBuf,
    cache: RwLock<HashMap<String, Session>>,
}

impl FileSessionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File path for a session key. The key is percent-encoded, so distinct
    /// keys never share a file.
    pub fn session_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.jsonl", urlencoding::encode(key)))
    }

    fn load_from_disk(&self, key: &str) -> Result<Option<Session>, SessionError> {
        let path = self.session_path(key);
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(SessionError::Storage(format!(
                    "Failed to read {}: {e}",
                    path.display()
                )));
            }
        };

        let mut session = Session::new(key);
        for (line_no, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            if line_no == 0 {
                if let Ok(meta) = serde_json::from_str::<MetadataLine>(line)
                    && meta.kind == METADATA_KIND
                {
                    if meta.key != key {
                        warn!(
                            key = %key,
                            file_key = %meta.key,
                            path = %path.display(),
                            "Session file belongs to another key; ignoring it"
                        );
                        return Ok(None);
                    }
                    session.created_at = meta.created_at;
                    session.updated_at = meta.updated_at;
                    continue;
                }
            }
            match serde_json::from_str::<HistoryEntry>(line) {
                Ok(entry) => session.entries.push(entry),
                Err(e) => {
                    warn!(key = %key, line = line_no + 1, error = %e, "Skipping corrupted session entry");
                }
            }
        }

        debug!(key = %key, entries = session.len(), "Session loaded from disk");
        Ok(Some(session))
    }

    fn write_to_disk(&self, session: &Session) -> Result<(), SessionError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| {
            SessionError::Storage(format!("Failed to create session directory: {e}"))
        })?;

        let serialize_err =
            |e: serde_json::Error| SessionError::Storage(format!("Failed to serialize session: {e}"));

        let mut content = serde_json::to_string(&MetadataLine {
            kind: METADATA_KIND.into(),
            key: session.key.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        })
        .map_err(serialize_err)?;
        content.push('\n');

        for entry in &session.entries {
            content.push_str(&serde_json::to_string(entry).map_err(serialize_err)?);
            content.push('\n');
        }

        // Write-then-rename so a crash never leaves a half-written session.
        let path = self.session_path(&session.key);
        let tmp = path.with_extension("jsonl.tmp");
        std::fs::write(&tmp, content)
            .and_then(|()| std::fs::rename(&tmp, &path))
            .map_err(|e| {
                SessionError::Storage(format!("Failed to write {}: {e}", path.display()))
            })
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn get_or_create(&self, key: &str) -> Result<Session, SessionError> {
        if let Some(session) = self.cache.read().await.get(key) {
            return Ok(session.clone());
        }

        let session = self
            .load_from_disk(key)?
            .unwrap_or_else(|| Session::new(key));
        self.cache
            .write()
            .await
            .insert(key.to_string(), session.clone());
        Ok(session)
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.write_to_disk(session)?;
        self.cache
            .write()
            .await
            .insert(session.key.clone(), session.clone());
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, SessionError> {
        let read_dir = match std::fs::read_dir(&self.dir) {
            Ok(rd) => rd,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(SessionError::Storage(e.to_string())),
        };

        let mut keys: Vec<String> = read_dir
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|ext| ext == "jsonl"))
            .filter_map(|p| {
                let content = std::fs::read_to_string(&p).ok()?;
                let first = content.lines().next()?;
                serde_json::from_str::<MetadataLine>(first).ok().map(|m| m.key)
            })
            .collect();
        keys.sort();
        Ok(keys)
    }
}
