//! LLM module - Language Model integrations
//!
//! Provides the provider abstraction, the model factory, and an Ollama backend.

pub mod models;
pub mod ollama;
pub mod traits;

pub use models::{ChatModel, ModelFactory};
pub use ollama::OllamaClient;
pub use traits::{GenerateOptions, LLMProvider, LLMResponse, TokenUsage};
