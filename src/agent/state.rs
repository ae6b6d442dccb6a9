//! Agent run state
//!
//! [`AgentState`] is the context threaded through every step of one graph run.
//! Steps never mutate it directly: they return a [`StateUpdate`] which the graph
//! applies, so message history only ever grows.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::cluster::ClusterClient;
use crate::core::{CompanionError, Message, Result};

/// Progress of a subtask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubTaskStatus {
    Pending,
    InProgress,
    Completed,
}

/// A unit of work assigned to one agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubTask {
    pub id: String,
    pub description: String,
    /// Name of the agent that owns this subtask
    pub assigned_to: String,
    pub status: SubTaskStatus,
}

impl SubTask {
    /// Create a pending subtask
    pub fn new(
        id: impl Into<String>,
        description: impl Into<String>,
        assigned_to: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            assigned_to: assigned_to.into(),
            status: SubTaskStatus::Pending,
        }
    }

    pub fn with_status(mut self, status: SubTaskStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether `agent` should still work on this subtask
    pub fn is_actionable_by(&self, agent: &str) -> bool {
        self.assigned_to == agent && self.status != SubTaskStatus::Completed
    }
}

/// Mutable execution context of one agent run
#[derive(Clone, Default, Serialize)]
pub struct AgentState {
    messages: Vec<Message>,
    pub subtasks: Vec<SubTask>,
    /// Subtask picked by the selector for this run
    pub active_subtask: Option<SubTask>,
    /// Set once the step budget is spent or nothing is left to do
    pub is_last_step: bool,
    #[serde(skip)]
    client_handle: Option<Arc<dyn ClusterClient>>,
}

impl AgentState {
    /// Create state seeded with the given messages
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_subtasks(mut self, subtasks: Vec<SubTask>) -> Self {
        self.subtasks = subtasks;
        self
    }

    pub fn with_client(mut self, client: Arc<dyn ClusterClient>) -> Self {
        self.client_handle = Some(client);
        self
    }

    /// Messages accumulated so far, oldest first
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Append a message
    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Cluster capability of this run
    pub fn client(&self) -> Option<&Arc<dyn ClusterClient>> {
        self.client_handle.as_ref()
    }

    /// Fold a step's output into the state
    pub fn apply(&mut self, update: &StateUpdate) {
        self.messages.extend(update.messages.iter().cloned());
        if let Some(ref subtask) = update.active_subtask {
            self.active_subtask = Some(subtask.clone());
        }
        if update.is_last_step {
            self.is_last_step = true;
        }
    }

    /// Mark a subtask completed on behalf of its owner
    ///
    /// Only the agent the subtask is assigned to may complete it. The graph
    /// calls this when a model step answers without requesting tools.
    pub fn complete_subtask(&mut self, subtask_id: &str, agent: &str) -> Result<()> {
        let subtask = self
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or_else(|| CompanionError::Other(format!("unknown subtask '{}'", subtask_id)))?;

        if subtask.assigned_to != agent {
            return Err(CompanionError::Other(format!(
                "subtask '{}' is owned by '{}', not '{}'",
                subtask_id, subtask.assigned_to, agent
            )));
        }

        subtask.status = SubTaskStatus::Completed;
        if let Some(ref mut active) = self.active_subtask {
            if active.id == subtask_id {
                active.status = SubTaskStatus::Completed;
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for AgentState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentState")
            .field("messages", &self.messages)
            .field("subtasks", &self.subtasks)
            .field("active_subtask", &self.active_subtask)
            .field("is_last_step", &self.is_last_step)
            .field("client_handle", &self.client_handle.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Output of one graph step
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Messages to append
    pub messages: Vec<Message>,
    /// Subtask selected by this step
    pub active_subtask: Option<SubTask>,
    /// Raise the last-step flag
    pub is_last_step: bool,
    /// Subtask the agent finished in this step
    pub completed_subtask: Option<String>,
}

impl StateUpdate {
    pub fn message(message: Message) -> Self {
        Self {
            messages: vec![message],
            ..Default::default()
        }
    }
}
