//! Tool execution step

use futures::future::try_join_all;
use std::sync::Arc;
use tracing::debug;

use crate::agent::state::{AgentState, StateUpdate};
use crate::core::{CompanionError, Message, Result};
use crate::tools::{ToolContext, ToolRegistry};

/// Runs the tool calls of the last model message
#[derive(Clone)]
pub struct ToolStep {
    registry: Arc<ToolRegistry>,
}

impl ToolStep {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// One result message per call, in call order
    pub async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let calls = match state.last_message() {
            Some(message) if message.has_tool_calls() => &message.tool_calls,
            _ => return Ok(StateUpdate::default()),
        };

        let client = state
            .client()
            .cloned()
            .ok_or_else(|| CompanionError::config("cluster client is not initialized"))?;
        let ctx = ToolContext { client };

        debug!(calls = calls.len(), "executing tool calls");
        let results =
            try_join_all(calls.iter().map(|call| self.registry.execute(call, &ctx))).await?;

        Ok(StateUpdate {
            messages: results.into_iter().map(Message::from).collect(),
            ..Default::default()
        })
    }
}

impl std::fmt::Debug for ToolStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolStep")
            .field("tools", &self.registry.len())
            .finish()
    }
}
