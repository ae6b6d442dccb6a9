//! Ollama client implementation
//!
//! Async HTTP client for the Ollama chat API with tool calling support.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::core::{CompanionError, Config, Message, Result, ToolCall, ToolDefinition};
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};

/// Ollama API client
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    base_url: String,
}

/// Ollama chat request
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [ToolDefinition]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
    stream: bool,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OllamaToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_name: Option<String>,
}

/// Ollama tool call format
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    function: OllamaFunction,
}

/// Ollama function in tool call
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OllamaFunction {
    name: String,
    arguments: serde_json::Value,
}

/// Ollama generation options
#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

/// Ollama chat response (non-streaming)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: OllamaMessage,
    model: String,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

/// Ollama models list response
#[derive(Debug, Deserialize)]
struct ModelsResponse {
    models: Vec<ModelInfo>,
}

/// Model information
#[derive(Debug, Deserialize)]
struct ModelInfo {
    name: String,
}

impl OllamaClient {
    /// Create a new Ollama client from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.ollama.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.ollama_url(),
        })
    }

    /// Create a client with custom base URL
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(120)).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Convert internal Message to Ollama format
    fn to_ollama_message(msg: &Message) -> OllamaMessage {
        OllamaMessage {
            role: msg.role.to_string(),
            content: msg.content.clone(),
            tool_calls: (!msg.tool_calls.is_empty()).then(|| {
                msg.tool_calls
                    .iter()
                    .map(|tc| OllamaToolCall {
                        id: Some(tc.id.clone()),
                        function: OllamaFunction {
                            name: tc.name.clone(),
                            arguments: tc.arguments.clone(),
                        },
                    })
                    .collect()
            }),
            tool_name: msg.tool_call_id.as_ref().and(msg.name.clone()),
        }
    }

    /// Convert Ollama response to LLMResponse
    fn to_llm_response(response: ChatResponse) -> LLMResponse {
        let id = response
            .created_at
            .as_ref()
            .map(|created| format!("{}-{}", response.model, created));

        let tool_calls = response
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .enumerate()
            .map(|(i, tc)| ToolCall {
                id: tc.id.unwrap_or_else(|| format!("call_{}", i)),
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        let usage = match (response.prompt_eval_count, response.eval_count) {
            (Some(prompt), Some(completion)) => Some(TokenUsage {
                prompt_tokens: prompt,
                completion_tokens: completion,
                total_tokens: prompt + completion,
            }),
            _ => None,
        };

        LLMResponse {
            id,
            content: response.message.content,
            tool_calls,
            usage,
            model: response.model,
        }
    }

    async fn post_chat(&self, request: &ChatRequest<'_>) -> Result<LLMResponse> {
        debug!(
            model = request.model,
            messages = request.messages.len(),
            tools = request.tools.map_or(0, |t| t.len()),
            "ollama chat request"
        );

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    CompanionError::model(format!(
                        "Cannot connect to Ollama at {}. Is it running?",
                        self.base_url
                    ))
                } else {
                    CompanionError::from(e)
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(CompanionError::model(format!(
                "Ollama API error ({}): {}",
                status, error_text
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| CompanionError::model(format!("Failed to parse response: {}", e)))?;

        Ok(Self::to_llm_response(chat_response))
    }

    fn options(options: Option<GenerateOptions>) -> Option<OllamaOptions> {
        options.map(|opts| OllamaOptions {
            temperature: opts.temperature,
            num_predict: opts.max_tokens,
            stop: opts.stop,
        })
    }
}

#[async_trait]
impl LLMProvider for OllamaClient {
    async fn chat(
        &self,
        model: &str,
        messages: &[Message],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = ChatRequest {
            model,
            messages: messages.iter().map(Self::to_ollama_message).collect(),
            tools: None,
            options: Self::options(options),
            stream: false,
        };
        self.post_chat(&request).await
    }

    async fn chat_with_tools(
        &self,
        model: &str,
        messages: &[Message],
        tools: &[ToolDefinition],
        options: Option<GenerateOptions>,
    ) -> Result<LLMResponse> {
        let request = ChatRequest {
            model,
            messages: messages.iter().map(Self::to_ollama_message).collect(),
            tools: Some(tools),
            options: Self::options(options),
            stream: false,
        };
        self.post_chat(&request).await
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.base_url))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(CompanionError::model("Failed to list models"));
        }

        let models_response: ModelsResponse = response.json().await?;
        Ok(models_response.models.into_iter().map(|m| m.name).collect())
    }

    fn name(&self) -> &str {
        "ollama"
    }
}
