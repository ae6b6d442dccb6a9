//! Shared test doubles for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use companion::cluster::ClusterClient;
use companion::core::{CompanionError, Message, Result, ToolCall, ToolDefinition};
use companion::llm::{ChatModel, GenerateOptions, LLMProvider, LLMResponse, ModelFactory};
use companion::session::{ConversationGraph, GraphInput, GraphStream};

pub const TEST_MODEL: &str = "qwen3:8b";

/// One scripted model turn
pub enum Reply {
    Respond(LLMResponse),
    Fail(String),
    Hang(Duration),
}

/// Provider that replays a fixed script and records every prompt it sees
#[derive(Default)]
pub struct ScriptedProvider {
    script: Mutex<VecDeque<Reply>>,
    /// Reply used once the script runs out
    fallback: Mutex<Option<LLMResponse>>,
    prompts: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedProvider {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(replies.into()),
            ..Default::default()
        })
    }

    /// Answer every call with `response`
    pub fn repeating(response: LLMResponse) -> Arc<Self> {
        Arc::new(Self {
            fallback: Mutex::new(Some(response)),
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<Vec<Message>> {
        self.prompts.lock().unwrap().clone()
    }

    async fn next(&self, messages: &[Message]) -> Result<LLMResponse> {
        self.prompts.lock().unwrap().push(messages.to_vec());
        let reply = self.script.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Respond(response)) => Ok(response),
            Some(Reply::Fail(message)) => Err(CompanionError::model(message)),
            Some(Reply::Hang(duration)) => {
                tokio::time::sleep(duration).await;
                Ok(LLMResponse::text("too late"))
            }
            None => self
                .fallback
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| CompanionError::model("script exhausted")),
        }
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn chat(
        &self,
        _model: &str,
        messages: &[Message],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(messages).await
    }

    async fn chat_with_tools(
        &self,
        _model: &str,
        messages: &[Message],
        _tools: &[ToolDefinition],
        _options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        self.next(messages).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        Ok(vec![TEST_MODEL.to_string()])
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn model(provider: Arc<ScriptedProvider>) -> ChatModel {
    ModelFactory::with_provider(provider)
        .create_model(TEST_MODEL)
        .unwrap()
}

pub fn k8s_call(id: &str, uri: &str) -> ToolCall {
    ToolCall::new(id, "k8s_query", json!({ "uri": uri }))
}

/// Cluster that answers every GET with a canned body and remembers the paths
pub struct StubCluster {
    body: Value,
    fail: bool,
    requests: Mutex<Vec<String>>,
}

impl StubCluster {
    pub fn new(body: Value) -> Arc<Self> {
        Arc::new(Self {
            body,
            fail: false,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            body: Value::Null,
            fail: true,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ClusterClient for StubCluster {
    fn api_server(&self) -> &str {
        "https://stub.cluster:6443"
    }

    async fn execute_get_api_request(&self, uri: &str) -> Result<Value> {
        self.requests.lock().unwrap().push(uri.to_string());
        if self.fail {
            return Err(CompanionError::cluster("connection refused"));
        }
        Ok(self.body.clone())
    }
}

/// Graph that emits a fixed list of chunks, optionally ending in an error
pub struct StubGraph {
    chunks: Vec<String>,
    error: Option<String>,
    inputs: Mutex<Vec<GraphInput>>,
}

impl StubGraph {
    pub fn new(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            error: None,
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn failing_after(chunks: &[&str], error: &str) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            error: Some(error.to_string()),
            inputs: Mutex::new(Vec::new()),
        })
    }

    pub fn runs(&self) -> usize {
        self.inputs.lock().unwrap().len()
    }

    pub fn last_input(&self) -> Option<GraphInput> {
        self.inputs.lock().unwrap().last().cloned()
    }
}

impl ConversationGraph for StubGraph {
    fn stream(&self, input: GraphInput) -> GraphStream {
        self.inputs.lock().unwrap().push(input);
        let mut items: Vec<Result<String>> = self.chunks.iter().cloned().map(Ok).collect();
        if let Some(ref error) = self.error {
            items.push(Err(CompanionError::model(error.clone())));
        }
        Box::pin(tokio_stream::iter(items))
    }
}
