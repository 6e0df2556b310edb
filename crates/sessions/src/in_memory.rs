//! In-memory session store. Nothing survives a restart.

use std::collections::HashMap;

use async_trait::async_trait;
use nanoclaw_core::error::SessionError;
use nanoclaw_core::session::{Session, SessionStore};
use tokio::sync::RwLock;

#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn get_or_create(&self, key: &str) -> Result<Session, SessionError> {
        Ok(self
            .sessions
            .read()
            .await
            .get(key)
            .cloned()
            .unwrap_or_else(|| Session::new(key)))
    }

    async fn save(&self, session: &Session) -> Result<(), SessionError> {
        self.sessions
            .write()
            .await
            .insert(session.key.clone(), session.clone());
        Ok(())
    }

    async fn list_keys(&self) -> Result<Vec<String>, SessionError> {
        let mut keys: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
