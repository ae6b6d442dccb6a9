//! In-process history store

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::core::Result;
use crate::history::{ConversationMessage, HistoryStore};

/// History kept in a map of per-session vectors
#[derive(Debug, Default)]
pub struct InMemoryHistoryStore {
    sessions: RwLock<HashMap<String, Vec<ConversationMessage>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sessions with at least one record
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, session_id: &str, message: ConversationMessage) -> Result<()> {
        self.sessions
            .write()
            .await
            .entry(session_id.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn read_all(&self, session_id: &str) -> Result<Vec<ConversationMessage>> {
        Ok(self
            .sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }
}
