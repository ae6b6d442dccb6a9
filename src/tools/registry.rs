//! Tool registry - manages and dispatches tool calls
//!
//! Central hub for registering tools and routing tool calls to handlers by name.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::cluster::ClusterClient;
use crate::core::{CompanionError, Result, ToolCall, ToolDefinition, ToolResult};

/// Per-run context handed to every tool call
#[derive(Clone)]
pub struct ToolContext {
    /// Cluster capability of the current run
    pub client: Arc<dyn ClusterClient>,
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext")
            .field("client", &"<redacted>")
            .finish()
    }
}

/// A tool the model can call
#[async_trait]
pub trait Tool: Send + Sync {
    /// Definition advertised to the model
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with the model-provided arguments
    async fn call(&self, arguments: &serde_json::Value, ctx: &ToolContext) -> Result<String>;
}

/// Registry of available tools
#[derive(Default, Clone)]
pub struct ToolRegistry {
    /// Tools indexed by name
    tools: HashMap<String, Arc<dyn Tool>>,
    /// Registration order, so definitions are stable across runs
    order: Vec<String>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in cluster tools
    pub fn with_cluster_tools() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(crate::tools::K8sQueryTool));
        registry
    }

    /// Register a tool, replacing any tool with the same name
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.definition().function.name;
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    /// Get all tool definitions in registration order
    pub fn all_definitions(&self) -> Vec<ToolDefinition> {
        self.order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.definition())
            .collect()
    }

    /// Check whether a tool is registered
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a tool call
    ///
    /// Unknown tools produce a failed result for that call only. Errors raised
    /// by a registered tool propagate to the caller.
    pub async fn execute(&self, tool_call: &ToolCall, ctx: &ToolContext) -> Result<ToolResult> {
        let Some(tool) = self.tools.get(&tool_call.name) else {
            warn!(tool = %tool_call.name, "model requested unknown tool");
            return Ok(ToolResult::failure(
                tool_call,
                format!(
                    "Error: {} is not a valid tool, try one of [{}].",
                    tool_call.name,
                    self.order.join(", ")
                ),
            ));
        };

        debug!(tool = %tool_call.name, call_id = %tool_call.id, "executing tool");
        let output = tool
            .call(&tool_call.arguments, ctx)
            .await
            .map_err(|e| match e {
                CompanionError::ToolExecution(_) => e,
                other => CompanionError::tool(format!("{}: {}", tool_call.name, other)),
            })?;

        Ok(ToolResult::success(tool_call, output))
    }
}
