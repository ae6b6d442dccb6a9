//! Conversation service tests
//!
//! Opening questions, streamed turns and what ends up in history.

mod common;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_test::{assert_err, assert_ok};

use common::{model, Reply, ScriptedProvider, StubCluster, StubGraph};
use companion::agent::{AgentGraph, GraphConfig};
use companion::cluster::ClusterClient;
use companion::core::{CompanionError, Result, UserMessage};
use companion::history::{ConversationMessage, HistoryStore, InMemoryHistoryStore};
use companion::llm::LLMResponse;
use companion::session::{
    ConversationGraph, ConversationService, InitialQuestionsHandler, ManualClock,
    ModelQuestionsHandler,
};
use companion::tools::ToolRegistry;

/// Questions handler with a fixed answer
struct FixedQuestions {
    questions: Vec<String>,
    fail: bool,
}

impl FixedQuestions {
    fn new(questions: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            questions: questions.iter().map(|q| q.to_string()).collect(),
            fail: false,
        })
    }

    fn failing() -> Arc<Self> {
        Arc::new(Self {
            questions: Vec::new(),
            fail: true,
        })
    }
}

#[async_trait]
impl InitialQuestionsHandler for FixedQuestions {
    async fn fetch_relevant_data(
        &self,
        client: &dyn ClusterClient,
        _message: &UserMessage,
    ) -> Result<String> {
        if self.fail {
            return Err(CompanionError::cluster("cluster unreachable"));
        }
        Ok(client.execute_get_api_request("/api/v1/pods").await?.to_string())
    }

    async fn generate_questions(&self, _context: &str) -> Result<Vec<String>> {
        Ok(self.questions.clone())
    }
}

/// History store that refuses every write
struct ReadOnlyHistory;

#[async_trait]
impl HistoryStore for ReadOnlyHistory {
    async fn append(&self, _session_id: &str, _message: ConversationMessage) -> Result<()> {
        Err(CompanionError::history("store is read-only"))
    }

    async fn read_all(&self, _session_id: &str) -> Result<Vec<ConversationMessage>> {
        Ok(Vec::new())
    }

    async fn release(&self, _session_id: &str) -> Result<()> {
        Err(CompanionError::history("nothing to release"))
    }
}

/// History store whose first write fails
#[derive(Default)]
struct FlakyHistory {
    failed_once: AtomicBool,
    inner: InMemoryHistoryStore,
}

#[async_trait]
impl HistoryStore for FlakyHistory {
    async fn append(&self, session_id: &str, message: ConversationMessage) -> Result<()> {
        if !self.failed_once.swap(true, Ordering::SeqCst) {
            return Err(CompanionError::history("disk full"));
        }
        self.inner.append(session_id, message).await
    }

    async fn read_all(&self, session_id: &str) -> Result<Vec<ConversationMessage>> {
        self.inner.read_all(session_id).await
    }

    async fn release(&self, session_id: &str) -> Result<()> {
        self.inner.release(session_id).await
    }
}

struct Harness {
    service: ConversationService,
    history: Arc<InMemoryHistoryStore>,
    clock: Arc<ManualClock>,
}

fn harness(graph: Arc<dyn ConversationGraph>) -> Harness {
    let history = Arc::new(InMemoryHistoryStore::new());
    let clock = Arc::new(ManualClock::new(1_700_000_000.0));
    let service = ConversationService::builder(
        graph,
        history.clone(),
        FixedQuestions::new(&["q1?", "q2?", "q3?"]),
    )
    .clock(clock.clone())
    .build();
    Harness {
        service,
        history,
        clock,
    }
}

fn cluster() -> Arc<StubCluster> {
    StubCluster::new(json!({ "items": [] }))
}

async fn drain(service: &ConversationService, session: &str, query: &str) -> Vec<Vec<u8>> {
    service
        .handle_request(session, UserMessage::new(query), cluster())
        .map(|chunk| chunk.unwrap())
        .collect()
        .await
}

#[tokio::test]
async fn test_new_conversation_returns_questions_and_records_query() {
    let h = harness(StubGraph::new(&[]));

    let questions = assert_ok!(
        h.service
            .new_conversation("1", cluster(), UserMessage::new("test query"))
            .await
    );

    assert_eq!(questions, vec!["q1?", "q2?", "q3?"]);
    assert_eq!(
        h.history.read_all("1").await.unwrap(),
        vec![ConversationMessage::user_query("test query", 0.0)]
    );
}

#[tokio::test]
async fn test_new_conversation_failure_records_nothing() {
    let history = Arc::new(InMemoryHistoryStore::new());
    let service = ConversationService::builder(
        StubGraph::new(&[]),
        history.clone(),
        FixedQuestions::failing(),
    )
    .build();

    let err = assert_err!(
        service
            .new_conversation("1", cluster(), UserMessage::new("test query"))
            .await
    );
    assert!(matches!(err, CompanionError::Cluster(_)));
    assert!(history.read_all("1").await.unwrap().is_empty());
    assert!(service.session("1").await.is_none());
}

#[tokio::test]
async fn test_retry_after_failed_opening_starts_at_zero() {
    let history = Arc::new(FlakyHistory::default());
    let clock = Arc::new(ManualClock::new(1_700_000_000.0));
    let service = ConversationService::builder(
        StubGraph::new(&[]),
        history.clone(),
        FixedQuestions::new(&["q1?"]),
    )
    .clock(clock.clone())
    .build();

    let err = assert_err!(
        service
            .new_conversation("1", cluster(), UserMessage::new("test query"))
            .await
    );
    assert!(matches!(err, CompanionError::History(_)));
    assert!(service.session("1").await.is_none());

    clock.advance(3.0);
    assert_ok!(
        service
            .new_conversation("1", cluster(), UserMessage::new("test query"))
            .await
    );

    assert_eq!(
        history.read_all("1").await.unwrap(),
        vec![ConversationMessage::user_query("test query", 0.0)]
    );
    assert_eq!(service.session("1").await.unwrap().baseline, 1_700_000_003.0);
}

#[tokio::test]
async fn test_failed_first_turn_leaves_session_unregistered() {
    let service = ConversationService::builder(
        StubGraph::new(&["chunk1"]),
        Arc::new(ReadOnlyHistory),
        FixedQuestions::new(&[]),
    )
    .build();

    let results: Vec<_> = service
        .handle_request("1", UserMessage::new("test query"), cluster())
        .collect()
        .await;

    assert!(results.last().unwrap().is_err());
    assert!(service.session("1").await.is_none());
}

#[tokio::test]
async fn test_handle_request_forwards_chunks_in_order() {
    let graph = StubGraph::new(&["chunk1", "chunk2", "chunk3"]);
    let h = harness(graph.clone());

    let chunks = drain(&h.service, "1", "test query").await;

    assert_eq!(
        chunks,
        vec![
            b"chunk1".to_vec(),
            b"chunk2".to_vec(),
            b"chunk3".to_vec()
        ]
    );
    let input = graph.last_input().unwrap();
    assert_eq!(input.session_id, "1");
    assert_eq!(input.message.query, "test query");
}

#[tokio::test]
async fn test_completed_turn_is_recorded_with_relative_timestamp() {
    let h = harness(StubGraph::new(&["chunk1", "chunk2", "chunk3"]));

    h.service
        .new_conversation("1", cluster(), UserMessage::new("test query"))
        .await
        .unwrap();
    h.clock.advance(2.5);
    drain(&h.service, "1", "what next?").await;

    assert_eq!(
        h.history.read_all("1").await.unwrap(),
        vec![
            ConversationMessage::user_query("test query", 0.0),
            ConversationMessage::ai_response("what next?", "chunk1chunk2chunk3", 2.5),
        ]
    );
}

#[tokio::test]
async fn test_first_turn_without_opening_starts_at_zero() {
    let h = harness(StubGraph::new(&["answer"]));

    drain(&h.service, "fresh", "hello").await;

    assert_eq!(
        h.history.read_all("fresh").await.unwrap(),
        vec![ConversationMessage::ai_response("hello", "answer", 0.0)]
    );
    assert_eq!(h.service.session("fresh").await.unwrap().baseline, 1_700_000_000.0);
}

#[tokio::test]
async fn test_history_is_written_only_after_stream_completes() {
    let h = harness(StubGraph::new(&["chunk1", "chunk2"]));

    let mut stream = h
        .service
        .handle_request("1", UserMessage::new("test query"), cluster());

    assert_eq!(stream.next().await.unwrap().unwrap(), b"chunk1".to_vec());
    assert!(h.history.read_all("1").await.unwrap().is_empty());

    assert_eq!(stream.next().await.unwrap().unwrap(), b"chunk2".to_vec());
    assert!(h.history.read_all("1").await.unwrap().is_empty());

    assert!(stream.next().await.is_none());
    assert_eq!(h.history.read_all("1").await.unwrap().len(), 1);

    // finished streams stay finished
    assert!(stream.next().await.is_none());
    assert_eq!(h.history.read_all("1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_turn_yields_error_and_records_nothing() {
    let h = harness(StubGraph::failing_after(&["partial"], "model went away"));

    let mut stream = h
        .service
        .handle_request("1", UserMessage::new("test query"), cluster());

    assert_eq!(stream.next().await.unwrap().unwrap(), b"partial".to_vec());
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, CompanionError::Model(_)));
    assert!(stream.next().await.is_none());

    assert!(h.history.read_all("1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_dropped_stream_records_nothing() {
    let graph = StubGraph::new(&["chunk1", "chunk2", "chunk3"]);
    let h = harness(graph.clone());

    {
        let mut stream = h
            .service
            .handle_request("1", UserMessage::new("test query"), cluster());
        stream.next().await.unwrap().unwrap();
    }

    assert_eq!(graph.runs(), 1);
    assert!(h.history.read_all("1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_graph_is_not_started_until_polled() {
    let graph = StubGraph::new(&["chunk1"]);
    let h = harness(graph.clone());

    let stream = h
        .service
        .handle_request("1", UserMessage::new("test query"), cluster());
    assert_eq!(graph.runs(), 0);
    drop(stream);
    assert_eq!(graph.runs(), 0);
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let h = harness(StubGraph::new(&["ok"]));

    h.service
        .new_conversation("a", cluster(), UserMessage::new("about a"))
        .await
        .unwrap();
    h.clock.advance(10.0);
    h.service
        .new_conversation("b", cluster(), UserMessage::new("about b"))
        .await
        .unwrap();
    h.clock.advance(1.0);
    drain(&h.service, "a", "more on a").await;

    assert_eq!(
        h.history.read_all("a").await.unwrap(),
        vec![
            ConversationMessage::user_query("about a", 0.0),
            ConversationMessage::ai_response("more on a", "ok", 11.0),
        ]
    );
    assert_eq!(
        h.history.read_all("b").await.unwrap(),
        vec![ConversationMessage::user_query("about b", 0.0)]
    );
}

#[tokio::test]
async fn test_persistence_failure_surfaces_after_chunks() {
    let service = ConversationService::builder(
        StubGraph::new(&["chunk1"]),
        Arc::new(ReadOnlyHistory),
        FixedQuestions::new(&[]),
    )
    .build();

    let results: Vec<_> = service
        .handle_request("1", UserMessage::new("test query"), cluster())
        .collect()
        .await;

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].as_ref().unwrap(), &b"chunk1".to_vec());
    assert!(matches!(results[1], Err(CompanionError::History(_))));
}

#[tokio::test]
async fn test_end_session_swallows_cleanup_errors() {
    let service = ConversationService::builder(
        StubGraph::new(&[]),
        Arc::new(ReadOnlyHistory),
        FixedQuestions::new(&[]),
    )
    .build();

    assert!(!service.end_session("never-seen").await);
}

#[tokio::test]
async fn test_end_session_forgets_baseline_but_keeps_history() {
    let h = harness(StubGraph::new(&["ok"]));

    h.service
        .new_conversation("1", cluster(), UserMessage::new("test query"))
        .await
        .unwrap();
    assert!(h.service.end_session("1").await);
    assert!(h.service.session("1").await.is_none());
    assert_eq!(h.history.read_all("1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_agent_graph_turn_is_streamed_and_recorded() {
    let provider = ScriptedProvider::new(vec![Reply::Respond(LLMResponse::text(
        "Your cluster looks healthy.",
    ))]);
    let graph = AgentGraph::new(
        "k8s",
        model(provider),
        Arc::new(ToolRegistry::with_cluster_tools()),
        GraphConfig::default(),
    )
    .unwrap();
    let h = harness(Arc::new(graph));

    let chunks = drain(&h.service, "1", "how is my cluster?").await;
    assert_eq!(chunks.len(), 2);

    let expected: String = chunks
        .iter()
        .map(|c| String::from_utf8(c.clone()).unwrap())
        .collect();
    assert!(expected.contains("Your cluster looks healthy."));

    let records = h.history.read_all("1").await.unwrap();
    assert_eq!(
        records,
        vec![ConversationMessage::ai_response("how is my cluster?", expected, 0.0)]
    );
}

#[tokio::test]
async fn test_model_questions_handler_uses_resource_context() {
    let provider = ScriptedProvider::new(vec![Reply::Respond(LLMResponse::text(
        "1. Why is my-pod restarting?\n2. Which image does it run?\n",
    ))]);
    let handler = ModelQuestionsHandler::new(model(provider.clone()));
    let cluster = StubCluster::new(json!({ "kind": "Pod", "metadata": { "name": "my-pod" } }));

    let message = UserMessage {
        query: "Tell me about my-pod".to_string(),
        resource_kind: Some("Pod".to_string()),
        resource_name: Some("my-pod".to_string()),
        namespace: Some("default".to_string()),
        ..Default::default()
    };

    let context = handler
        .fetch_relevant_data(cluster.as_ref(), &message)
        .await
        .unwrap();
    assert_eq!(cluster.requests(), vec!["/api/v1/namespaces/default/pods/my-pod"]);
    assert!(context.contains("my-pod"));

    let questions = handler.generate_questions(&context).await.unwrap();
    assert_eq!(
        questions,
        vec!["Why is my-pod restarting?", "Which image does it run?"]
    );
    assert!(provider.prompts()[0][0].content.contains("my-pod"));
}

#[tokio::test]
async fn test_model_questions_handler_falls_back_to_warning_events() {
    let provider = ScriptedProvider::new(vec![]);
    let handler = ModelQuestionsHandler::new(model(provider));
    let cluster = StubCluster::new(json!({ "items": [] }));

    handler
        .fetch_relevant_data(cluster.as_ref(), &UserMessage::new("anything wrong?"))
        .await
        .unwrap();
    assert_eq!(
        cluster.requests(),
        vec!["/api/v1/events?fieldSelector=type%3DWarning"]
    );
}
