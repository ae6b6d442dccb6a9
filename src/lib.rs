//! Companion - Kubernetes companion agent backend
//!
//! Answers questions about a cluster with a tool-using LLM agent, streams the
//! agent's progress back to the caller and keeps a per-session history.
//!
//! # Architecture
//!
//! - **Core**: Shared types, configuration, and error handling
//! - **LLM**: Chat model abstraction with an Ollama implementation
//! - **Cluster**: Read-only access to the Kubernetes API
//! - **Tools**: Tool registry and the cluster query tool
//! - **Agent**: The orchestration graph (selector, model, tools)
//! - **History**: Append-only conversation logs
//! - **Session**: The conversation service tying it all together
//! - **CLI**: Command-line interface and REPL
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use companion::{
//!     agent::{AgentGraph, GraphConfig},
//!     cluster::HttpClusterClient,
//!     history::InMemoryHistoryStore,
//!     llm::ModelFactory,
//!     session::{ConversationService, ModelQuestionsHandler},
//!     tools::ToolRegistry,
//!     Config, UserMessage,
//! };
//!
//! #[tokio::main]
//! async fn main() -> companion::Result<()> {
//!     let config = Config::load();
//!     let model = ModelFactory::from_config(&config)?.create_model(&config.model.name)?;
//!     let graph = AgentGraph::new(
//!         "k8s",
//!         model.clone(),
//!         Arc::new(ToolRegistry::with_cluster_tools()),
//!         GraphConfig::default(),
//!     )?;
//!     let service = ConversationService::builder(
//!         Arc::new(graph),
//!         Arc::new(InMemoryHistoryStore::new()),
//!         Arc::new(ModelQuestionsHandler::new(model)),
//!     )
//!     .build();
//!
//!     let client = Arc::new(HttpClusterClient::from_config(&config.cluster)?);
//!     let mut chunks = service.handle_request("s1", UserMessage::new("list my pods"), client);
//!     while let Some(chunk) = chunks.next().await {
//!         print!("{}", String::from_utf8_lossy(&chunk?));
//!     }
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod cli;
pub mod cluster;
pub mod core;
pub mod history;
pub mod llm;
pub mod session;
pub mod tools;

// Re-export commonly used items
pub use agent::AgentGraph;
pub use cli::Repl;
pub use core::{CompanionError, Config, Result, UserMessage};
pub use session::ConversationService;
