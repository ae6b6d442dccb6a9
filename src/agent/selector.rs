//! Subtask selection
//!
//! Picks the first subtask this agent still owes work on, or declares the agent
//! done.

use tracing::debug;

use crate::agent::state::{AgentState, StateUpdate};
use crate::core::{CompanionError, Message, Result};

/// Text emitted when the agent has nothing left to do
pub const ALL_SUBTASKS_COMPLETED: &str = "All my subtasks are already completed.";

/// Selects the active subtask for one agent
#[derive(Debug, Clone)]
pub struct SubtaskSelector {
    agent_name: String,
}

impl SubtaskSelector {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
        }
    }

    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Scan subtasks in stored order
    ///
    /// Fails before scanning when the run has no cluster client.
    pub fn select(&self, state: &AgentState) -> Result<StateUpdate> {
        if state.client().is_none() {
            return Err(CompanionError::config(format!(
                "{} agent: cluster client is not initialized",
                self.agent_name
            )));
        }

        if let Some(subtask) = state
            .subtasks
            .iter()
            .find(|s| s.is_actionable_by(&self.agent_name))
        {
            debug!(agent = %self.agent_name, subtask = %subtask.id, "selected subtask");
            return Ok(StateUpdate {
                active_subtask: Some(subtask.clone()),
                ..Default::default()
            });
        }

        debug!(agent = %self.agent_name, "no actionable subtask");
        Ok(StateUpdate {
            messages: vec![Message::assistant(ALL_SUBTASKS_COMPLETED).named(&self.agent_name)],
            is_last_step: true,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::state::{SubTask, SubTaskStatus};
    use crate::cluster::ClusterClient;
    use async_trait::async_trait;
    use std::sync::Arc;

    struct StubCluster;

    #[async_trait]
    impl ClusterClient for StubCluster {
        fn api_server(&self) -> &str {
            "https://stub"
        }

        async fn execute_get_api_request(&self, _uri: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }
    }

    fn state_with(subtasks: Vec<SubTask>) -> AgentState {
        AgentState::default()
            .with_subtasks(subtasks)
            .with_client(Arc::new(StubCluster))
    }

    #[test]
    fn test_selects_pending_subtask() {
        let task = SubTask::new("1", "list pods", "k8s");
        let state = state_with(vec![task.clone()]);

        let update = SubtaskSelector::new("k8s").select(&state).unwrap();
        assert_eq!(update.active_subtask, Some(task));
        assert!(!update.is_last_step);
        assert!(update.messages.is_empty());
    }

    #[test]
    fn test_all_completed_ends_run() {
        let state = state_with(vec![
            SubTask::new("1", "list pods", "k8s").with_status(SubTaskStatus::Completed)
        ]);

        let update = SubtaskSelector::new("k8s").select(&state).unwrap();
        assert!(update.active_subtask.is_none());
        assert!(update.is_last_step);
        assert_eq!(update.messages.len(), 1);
        assert_eq!(update.messages[0].content, ALL_SUBTASKS_COMPLETED);
        assert_eq!(update.messages[0].name.as_deref(), Some("k8s"));
    }

    #[test]
    fn test_first_match_in_order_skips_other_agents() {
        let state = state_with(vec![
            SubTask::new("1", "explain", "kyma"),
            SubTask::new("2", "done", "k8s").with_status(SubTaskStatus::Completed),
            SubTask::new("3", "describe", "k8s").with_status(SubTaskStatus::InProgress),
            SubTask::new("4", "later", "k8s"),
        ]);

        let update = SubtaskSelector::new("k8s").select(&state).unwrap();
        assert_eq!(update.active_subtask.unwrap().id, "3");
    }

    #[test]
    fn test_selection_is_deterministic() {
        let state = state_with(vec![
            SubTask::new("a", "one", "k8s"),
            SubTask::new("b", "two", "k8s"),
        ]);
        let selector = SubtaskSelector::new("k8s");
        assert_eq!(selector.select(&state).unwrap(), selector.select(&state).unwrap());
    }

    #[test]
    fn test_missing_client_is_config_error() {
        let state = AgentState::default().with_subtasks(vec![SubTask::new("1", "x", "k8s")]);
        let err = SubtaskSelector::new("k8s").select(&state).unwrap_err();
        assert!(err.is_config());
    }
}
