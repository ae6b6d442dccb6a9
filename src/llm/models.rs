//! Model definitions, presets and the model factory
//!
//! Only models listed in the preset table can be created; anything else is a
//! configuration error that names the valid set.

use std::sync::Arc;

use crate::core::{CompanionError, Config, Message, Result, ToolDefinition};
use crate::llm::ollama::OllamaClient;
use crate::llm::traits::{GenerateOptions, LLMProvider, LLMResponse};

/// Model preset with recommended settings
#[derive(Debug, Clone)]
pub struct ModelPreset {
    /// Model identifier
    pub name: &'static str,
    /// Human-readable display name
    pub display_name: &'static str,
    /// Recommended temperature
    pub default_temperature: f32,
    /// Whether this model supports function calling
    pub supports_tools: bool,
}

const PRESETS: &[ModelPreset] = &[
    ModelPreset {
        name: "qwen3:8b",
        display_name: "Qwen 3 8B",
        default_temperature: 0.0,
        supports_tools: true,
    },
    ModelPreset {
        name: "qwen2.5-coder:7b",
        display_name: "Qwen 2.5 Coder 7B",
        default_temperature: 0.0,
        supports_tools: true,
    },
    ModelPreset {
        name: "llama3.1:8b",
        display_name: "Llama 3.1 8B",
        default_temperature: 0.0,
        supports_tools: true,
    },
    ModelPreset {
        name: "mistral:7b",
        display_name: "Mistral 7B",
        default_temperature: 0.1,
        supports_tools: true,
    },
];

/// Get predefined model presets
pub fn get_model_presets() -> &'static [ModelPreset] {
    PRESETS
}

/// Find a model preset by name
pub fn find_preset(name: &str) -> Option<&'static ModelPreset> {
    PRESETS.iter().find(|p| p.name == name)
}

/// Names accepted by [`ModelFactory::create_model`]
pub fn supported_model_names() -> Vec<String> {
    PRESETS.iter().map(|p| p.name.to_string()).collect()
}

/// A provider bound to one model and its generation options
#[derive(Clone)]
pub struct ChatModel {
    provider: Arc<dyn LLMProvider>,
    name: String,
    options: GenerateOptions,
}

impl ChatModel {
    pub fn new(provider: Arc<dyn LLMProvider>, name: impl Into<String>) -> Self {
        Self {
            provider,
            name: name.into(),
            options: GenerateOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GenerateOptions) -> Self {
        self.options = options;
        self
    }

    /// Model identifier
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke the model with the given tools bound
    pub async fn invoke(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<LLMResponse> {
        if tools.is_empty() {
            self.provider
                .chat(&self.name, messages, Some(self.options.clone()))
                .await
        } else {
            self.provider
                .chat_with_tools(&self.name, messages, tools, Some(self.options.clone()))
                .await
        }
    }
}

impl std::fmt::Debug for ChatModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatModel")
            .field("provider", &self.provider.name())
            .field("name", &self.name)
            .finish()
    }
}

/// Creates models from identifiers
pub struct ModelFactory {
    provider: Arc<dyn LLMProvider>,
    temperature: Option<f32>,
}

impl ModelFactory {
    /// Factory backed by the configured Ollama server
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            provider: Arc::new(OllamaClient::from_config(config)?),
            temperature: config.model.temperature,
        })
    }

    /// Factory over an arbitrary provider
    pub fn with_provider(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            temperature: None,
        }
    }

    /// Create a model by identifier
    pub fn create_model(&self, name: &str) -> Result<ChatModel> {
        let preset = find_preset(name).ok_or_else(|| CompanionError::UnsupportedModel {
            name: name.to_string(),
            valid: supported_model_names(),
        })?;

        Ok(
            ChatModel::new(self.provider.clone(), preset.name).with_options(GenerateOptions {
                temperature: Some(self.temperature.unwrap_or(preset.default_temperature)),
                ..Default::default()
            }),
        )
    }
}
