//! Follow-up questions offered when a conversation starts
//!
//! The handler looks at the resource the user opened the conversation on and
//! asks the model what a user is likely to want to know about it.

use async_trait::async_trait;
use tracing::debug;

use crate::cluster::{resource_path, ClusterClient};
use crate::core::{Message, Result, UserMessage};
use crate::llm::ChatModel;

/// Produces the initial questions of a new conversation
#[async_trait]
pub trait InitialQuestionsHandler: Send + Sync {
    /// Gather cluster context relevant to the request
    async fn fetch_relevant_data(
        &self,
        client: &dyn ClusterClient,
        message: &UserMessage,
    ) -> Result<String>;

    /// Derive questions from the gathered context
    async fn generate_questions(&self, context: &str) -> Result<Vec<String>>;
}

const QUESTIONS_PROMPT: &str = "Given the following Kubernetes context, write up to {count} short \
questions a user is likely to ask about it. Write one question per line, nothing else.\n\n{context}";

/// Model-backed questions handler
#[derive(Debug, Clone)]
pub struct ModelQuestionsHandler {
    model: ChatModel,
    max_questions: usize,
}

impl ModelQuestionsHandler {
    pub fn new(model: ChatModel) -> Self {
        Self {
            model,
            max_questions: 5,
        }
    }

    pub fn with_max_questions(mut self, max: usize) -> Self {
        self.max_questions = max;
        self
    }
}

#[async_trait]
impl InitialQuestionsHandler for ModelQuestionsHandler {
    async fn fetch_relevant_data(
        &self,
        client: &dyn ClusterClient,
        message: &UserMessage,
    ) -> Result<String> {
        let path = match message.resource_kind.as_deref() {
            Some(kind) => resource_path(
                message.resource_api_version.as_deref().unwrap_or("v1"),
                kind,
                message.namespace.as_deref(),
                message.resource_name.as_deref(),
            ),
            // No resource in view: look at what is going wrong instead
            None => match message.namespace.as_deref() {
                Some(ns) => format!(
                    "/api/v1/namespaces/{}/events?fieldSelector=type%3DWarning",
                    ns
                ),
                None => "/api/v1/events?fieldSelector=type%3DWarning".to_string(),
            },
        };

        debug!(%path, "fetching context for initial questions");
        let data = client.execute_get_api_request(&path).await?;
        Ok(serde_json::to_string_pretty(&data)?)
    }

    async fn generate_questions(&self, context: &str) -> Result<Vec<String>> {
        let prompt = QUESTIONS_PROMPT
            .replace("{count}", &self.max_questions.to_string())
            .replace("{context}", context);

        let response = self.model.invoke(&[Message::user(prompt)], &[]).await?;
        Ok(parse_questions(&response.content, self.max_questions))
    }
}

/// One question per non-empty line, list markers stripped
pub fn parse_questions(text: &str, max: usize) -> Vec<String> {
    text.lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit())
                .trim_start_matches(|c: char| matches!(c, '-' | '*' | '.' | ')'))
                .trim()
        })
        .filter(|line| !line.is_empty())
        .take(max)
        .map(str::to_string)
        .collect()
}
