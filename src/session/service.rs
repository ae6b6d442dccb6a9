//! Conversation session service
//!
//! Owns the sessions of one backend instance. Each turn drives a graph run,
//! forwards its output as it is produced and records the completed turn in the
//! history store.
//!
//! A turn moves `New → Streaming → Completed | Failed`. Only `Completed` writes
//! to history; a failed or dropped stream leaves the session's history as it
//! was.

use futures::stream::BoxStream;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cluster::ClusterClient;
use crate::core::{Result, UserMessage};
use crate::history::{ConversationMessage, HistoryStore};
use crate::session::clock::{Clock, SystemClock};
use crate::session::graph::{ConversationGraph, GraphInput};
use crate::session::questions::InitialQuestionsHandler;

/// UTF-8 output chunks of one turn; finite and not restartable
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>>>;

/// Lifecycle of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    New,
    Streaming,
    Completed,
    Failed,
}

/// A logical conversation
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: String,
    /// Clock reading that timestamps of this session are relative to
    pub baseline: f64,
}

/// Sessions known to this service
#[derive(Debug, Default)]
struct SessionRegistry {
    sessions: Mutex<HashMap<String, Session>>,
}

impl SessionRegistry {
    /// Seconds since the session's baseline; unknown sessions start at `now`
    ///
    /// Nothing is registered here, see [`SessionRegistry::register`].
    async fn relative_timestamp(&self, session_id: &str, now: f64) -> f64 {
        let sessions = self.sessions.lock().await;
        sessions
            .get(session_id)
            .map_or(0.0, |session| now - session.baseline)
    }

    /// Record `baseline` for an unknown session once its first record is stored
    async fn register(&self, session_id: &str, baseline: f64) {
        self.sessions
            .lock()
            .await
            .entry(session_id.to_string())
            .or_insert_with(|| Session {
                id: session_id.to_string(),
                baseline,
            });
    }

    async fn get(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.get(session_id).cloned()
    }

    async fn remove(&self, session_id: &str) -> Option<Session> {
        self.sessions.lock().await.remove(session_id)
    }
}

/// Drives conversations: opening questions, streamed turns, persisted history
#[derive(Clone)]
pub struct ConversationService {
    graph: Arc<dyn ConversationGraph>,
    history: Arc<dyn HistoryStore>,
    questions: Arc<dyn InitialQuestionsHandler>,
    clock: Arc<dyn Clock>,
    sessions: Arc<SessionRegistry>,
}

/// Builder for [`ConversationService`]
pub struct ConversationServiceBuilder {
    graph: Arc<dyn ConversationGraph>,
    history: Arc<dyn HistoryStore>,
    questions: Arc<dyn InitialQuestionsHandler>,
    clock: Option<Arc<dyn Clock>>,
}

impl ConversationServiceBuilder {
    /// Use a custom time source
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> ConversationService {
        ConversationService {
            graph: self.graph,
            history: self.history,
            questions: self.questions,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            sessions: Arc::new(SessionRegistry::default()),
        }
    }
}

impl ConversationService {
    /// Create a builder with the required collaborators
    pub fn builder(
        graph: Arc<dyn ConversationGraph>,
        history: Arc<dyn HistoryStore>,
        questions: Arc<dyn InitialQuestionsHandler>,
    ) -> ConversationServiceBuilder {
        ConversationServiceBuilder {
            graph,
            history,
            questions,
            clock: None,
        }
    }

    /// History store backing this service
    pub fn history(&self) -> &Arc<dyn HistoryStore> {
        &self.history
    }

    /// Session registered under `session_id`, if any
    pub async fn session(&self, session_id: &str) -> Option<Session> {
        self.sessions.get(session_id).await
    }

    /// Open a conversation and suggest follow-up questions
    ///
    /// The opening `user_query` record is persisted before returning; if that
    /// write fails the whole call fails and the session stays unregistered.
    pub async fn new_conversation(
        &self,
        session_id: &str,
        client: Arc<dyn ClusterClient>,
        message: UserMessage,
    ) -> Result<Vec<String>> {
        info!(session_id, "starting new conversation");

        let context = self
            .questions
            .fetch_relevant_data(client.as_ref(), &message)
            .await?;
        let questions = self.questions.generate_questions(&context).await?;

        let now = self.clock.now();
        let timestamp = self.sessions.relative_timestamp(session_id, now).await;
        self.history
            .append(
                session_id,
                ConversationMessage::user_query(message.query, timestamp),
            )
            .await?;
        self.sessions.register(session_id, now).await;

        debug!(session_id, questions = questions.len(), "conversation opened");
        Ok(questions)
    }

    /// Run one turn, streaming the graph's output as it is produced
    ///
    /// The completed response is appended to history only after the graph
    /// finishes. Errors end the stream without a history write, and dropping
    /// the stream aborts the run.
    pub fn handle_request(
        &self,
        session_id: &str,
        message: UserMessage,
        client: Arc<dyn ClusterClient>,
    ) -> ChunkStream {
        let service = self.clone();
        let session_id = session_id.to_string();

        let stream = async_stream::stream! {
            let mut turn = TurnState::New;
            debug!(session_id = %session_id, ?turn, "turn created");

            let query = message.query.clone();
            let mut chunks = service.graph.stream(GraphInput {
                session_id: session_id.clone(),
                message,
                client,
            });

            turn = TurnState::Streaming;
            debug!(session_id = %session_id, ?turn, "streaming graph output");

            let mut response = String::new();
            while let Some(chunk) = chunks.next().await {
                match chunk {
                    Ok(chunk) => {
                        response.push_str(&chunk);
                        yield Ok(chunk.into_bytes());
                    }
                    Err(e) => {
                        turn = TurnState::Failed;
                        warn!(session_id = %session_id, ?turn, error = %e, "graph run failed");
                        yield Err(e);
                        return;
                    }
                }
            }

            let now = service.clock.now();
            let timestamp = service.sessions.relative_timestamp(&session_id, now).await;
            let record = ConversationMessage::ai_response(query, response, timestamp);
            if let Err(e) = service.history.append(&session_id, record).await {
                turn = TurnState::Failed;
                warn!(session_id = %session_id, ?turn, error = %e, "failed to persist response");
                yield Err(e);
                return;
            }
            service.sessions.register(&session_id, now).await;

            turn = TurnState::Completed;
            info!(session_id = %session_id, ?turn, "turn completed");
        };

        Box::pin(stream)
    }

    /// Forget a session; its history stays in the store
    ///
    /// Cleanup problems are logged and otherwise ignored.
    pub async fn end_session(&self, session_id: &str) -> bool {
        let known = self.sessions.remove(session_id).await.is_some();
        if let Err(e) = self.history.release(session_id).await {
            warn!(session_id, error = %e, "failed to release session history");
        }
        known
    }
}
