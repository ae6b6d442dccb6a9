//! LLM Provider trait for abstracting different backends
//!
//! The orchestration core only ever talks to models through [`LLMProvider`].

use async_trait::async_trait;

use crate::core::{Message, Result, ToolCall, ToolDefinition};

/// Response from an LLM provider
#[derive(Debug, Clone)]
pub struct LLMResponse {
    /// Identity token of the response
    pub id: Option<String>,
    /// Text content of the response
    pub content: String,
    /// Any tool calls the model wants to make
    pub tool_calls: Vec<ToolCall>,
    /// Token usage information
    pub usage: Option<TokenUsage>,
    /// Model that generated the response
    pub model: String,
}

impl LLMResponse {
    /// Plain text response without tool calls
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: None,
            content: content.into(),
            tool_calls: Vec::new(),
            usage: None,
            model: String::new(),
        }
    }

    /// Response requesting tool calls
    pub fn tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls,
            ..Self::text("")
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Convert into the assistant message that goes into agent state
    pub fn into_message(self) -> Message {
        Message {
            id: self.id,
            tool_calls: self.tool_calls,
            ..Message::assistant(self.content)
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Options for LLM generation
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Temperature for sampling (0.0 - 2.0)
    pub temperature: Option<f32>,
    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
    /// Stop sequences
    pub stop: Option<Vec<String>>,
}

/// Trait for LLM providers
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a response from messages
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// Generate a response with tool definitions
    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse>;

    /// List available models
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Get the provider name
    fn name(&self) -> &str;
}
