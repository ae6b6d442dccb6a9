//! Model invocation step

use tracing::{debug, warn};

use crate::agent::prompts::needs_more_steps;
use crate::agent::state::{AgentState, StateUpdate};
use crate::core::{filter_messages, CompanionError, Message, Result, ToolDefinition};
use crate::llm::ChatModel;

/// Builds the prompt from state and calls the model with the agent's tools bound
#[derive(Debug, Clone)]
pub struct ModelStep {
    agent_name: String,
    model: ChatModel,
    tools: Vec<ToolDefinition>,
    system_prompt: String,
}

impl ModelStep {
    pub fn new(
        agent_name: impl Into<String>,
        model: ChatModel,
        tools: Vec<ToolDefinition>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            agent_name: agent_name.into(),
            model,
            tools,
            system_prompt: system_prompt.into(),
        }
    }

    /// `[system] + filtered history + [task as user turn]`
    pub fn build_prompt(&self, state: &AgentState) -> Result<Vec<Message>> {
        let task = state.active_subtask.as_ref().ok_or_else(|| {
            CompanionError::config(format!("{} agent: no active subtask", self.agent_name))
        })?;

        let mut messages = Vec::with_capacity(state.messages().len() + 2);
        messages.push(Message::system(&self.system_prompt));
        messages.extend(filter_messages(state.messages()));
        messages.push(Message::user(&task.description));
        Ok(messages)
    }

    pub async fn run(&self, state: &AgentState) -> Result<StateUpdate> {
        let prompt = self.build_prompt(state)?;
        debug!(agent = %self.agent_name, messages = prompt.len(), "invoking model");

        let response = self.model.invoke(&prompt, &self.tools).await?;

        if state.is_last_step && !response.tool_calls.is_empty() {
            warn!(
                agent = %self.agent_name,
                pending_calls = response.tool_calls.len(),
                "step budget exhausted with tool calls pending"
            );
            let mut degraded = Message::assistant(needs_more_steps(&self.agent_name));
            degraded.id = response.id;
            return Ok(StateUpdate::message(degraded));
        }

        let completed_subtask = if response.tool_calls.is_empty() {
            state.active_subtask.as_ref().map(|task| task.id.clone())
        } else {
            None
        };
        Ok(StateUpdate {
            completed_subtask,
            ..StateUpdate::message(response.into_message())
        })
    }
}
