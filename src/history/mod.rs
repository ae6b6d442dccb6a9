//! Conversation history
//!
//! Append-only, per-session message logs. Sessions never see each other's
//! records.

pub mod file;
pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::core::config::{Config, HistoryBackend};
use crate::core::Result;

pub use file::FileHistoryStore;
pub use memory::InMemoryHistoryStore;

/// Kind of a persisted turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryType {
    UserQuery,
    AiResponse,
}

/// One persisted turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    #[serde(rename = "type")]
    pub kind: QueryType,
    pub query: String,
    pub response: String,
    /// Seconds since the session baseline
    pub timestamp: f64,
}

impl ConversationMessage {
    /// Opening record of a session
    pub fn user_query(query: impl Into<String>, timestamp: f64) -> Self {
        Self {
            kind: QueryType::UserQuery,
            query: query.into(),
            response: String::new(),
            timestamp,
        }
    }

    /// Completed answer to `query`
    pub fn ai_response(
        query: impl Into<String>,
        response: impl Into<String>,
        timestamp: f64,
    ) -> Self {
        Self {
            kind: QueryType::AiResponse,
            query: query.into(),
            response: response.into(),
            timestamp,
        }
    }
}

/// Append-only store of conversation turns keyed by session id
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append a record to the end of the session's log
    async fn append(&self, session_id: &str, message: ConversationMessage) -> Result<()>;

    /// All records of the session, oldest first; empty for unknown sessions
    async fn read_all(&self, session_id: &str) -> Result<Vec<ConversationMessage>>;

    /// Release resources held for a session. Records are kept.
    async fn release(&self, _session_id: &str) -> Result<()> {
        Ok(())
    }
}

/// Build the store selected in config
pub fn from_config(config: &Config) -> Arc<dyn HistoryStore> {
    match config.history.backend {
        HistoryBackend::Memory => Arc::new(InMemoryHistoryStore::new()),
        HistoryBackend::File => Arc::new(FileHistoryStore::new(config.history_dir())),
    }
}
