//! Orchestration graph
//!
//! Cycles Selector → Model → Tools → Model … until the model stops asking for
//! tools or the step budget runs out.
//!
//! ```text
//! Entry ──▶ Selecting ──▶ Model ──▶ Terminal
//!               │           ▲  │
//!               ▼           │  ▼
//!           Terminal        Tools
//! ```
//!
//! Routing lives in [`next_node`], a pure function of the current node and
//! state. Termination in the presence of a model that always asks for tools is
//! guaranteed by the step budget: once no further tool round trip fits,
//! `is_last_step` is raised and the model step degrades instead of forwarding
//! tool calls.

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::agent::prompts::K8S_AGENT_PROMPT;
use crate::agent::selector::SubtaskSelector;
use crate::agent::state::{AgentState, StateUpdate, SubTask};
use crate::agent::{ModelStep, ToolStep};
use crate::core::config::GraphSettings;
use crate::core::{CompanionError, Message, Result};
use crate::llm::ChatModel;
use crate::session::graph::{ConversationGraph, GraphInput, GraphStream};
use crate::tools::ToolRegistry;

/// Node of the orchestration state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphNode {
    Entry,
    Selecting,
    Model,
    Tools,
    Terminal,
}

impl std::fmt::Display for GraphNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphNode::Entry => write!(f, "entry"),
            GraphNode::Selecting => write!(f, "subtask_selector"),
            GraphNode::Model => write!(f, "agent"),
            GraphNode::Tools => write!(f, "tools"),
            GraphNode::Terminal => write!(f, "end"),
        }
    }
}

/// Transition table of the graph
pub fn next_node(node: GraphNode, state: &AgentState) -> GraphNode {
    match node {
        GraphNode::Entry => GraphNode::Selecting,
        GraphNode::Selecting => {
            if state.is_last_step && state.active_subtask.is_none() {
                GraphNode::Terminal
            } else {
                GraphNode::Model
            }
        }
        GraphNode::Model => match state.last_message() {
            Some(message) if message.has_tool_calls() => GraphNode::Tools,
            _ => GraphNode::Terminal,
        },
        GraphNode::Tools => GraphNode::Model,
        GraphNode::Terminal => GraphNode::Terminal,
    }
}

/// Limits of one graph run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphConfig {
    /// Wall-clock budget of a single step
    pub step_timeout: Duration,
    /// Maximum number of executed steps
    pub recursion_limit: usize,
}

impl GraphConfig {
    pub fn new(step_timeout: Duration, recursion_limit: usize) -> Self {
        Self {
            step_timeout,
            recursion_limit,
        }
    }

    /// Whether step `step` (1-based) is the last one that may call the model
    ///
    /// A tool round trip needs two more steps (Tools, then Model).
    pub fn is_last_step(&self, step: usize) -> bool {
        step + 2 > self.recursion_limit
    }

    fn validate(&self) -> Result<()> {
        if self.recursion_limit < 2 {
            return Err(CompanionError::config(format!(
                "recursion_limit must be at least 2, got {}",
                self.recursion_limit
            )));
        }
        if self.step_timeout.is_zero() {
            return Err(CompanionError::config("step timeout must be positive"));
        }
        Ok(())
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), 25)
    }
}

impl From<&GraphSettings> for GraphConfig {
    fn from(settings: &GraphSettings) -> Self {
        Self::new(settings.step_timeout(), settings.recursion_limit)
    }
}

/// Messages produced by one executed node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepOutput {
    pub node: GraphNode,
    pub messages: Vec<Message>,
}

/// Incremental output of a run
pub type StepStream = BoxStream<'static, Result<StepOutput>>;

/// The compiled single-agent graph
#[derive(Debug, Clone)]
pub struct AgentGraph {
    inner: Arc<GraphInner>,
}

#[derive(Debug)]
struct GraphInner {
    selector: SubtaskSelector,
    model_step: ModelStep,
    tool_step: ToolStep,
    config: GraphConfig,
}

impl AgentGraph {
    /// Build the graph for `agent_name` with the default system prompt
    pub fn new(
        agent_name: impl Into<String>,
        model: ChatModel,
        tools: Arc<ToolRegistry>,
        config: GraphConfig,
    ) -> Result<Self> {
        Self::with_system_prompt(agent_name, model, tools, config, K8S_AGENT_PROMPT)
    }

    pub fn with_system_prompt(
        agent_name: impl Into<String>,
        model: ChatModel,
        tools: Arc<ToolRegistry>,
        config: GraphConfig,
        system_prompt: impl Into<String>,
    ) -> Result<Self> {
        config.validate()?;
        let agent_name = agent_name.into();
        let model_step = ModelStep::new(
            agent_name.clone(),
            model,
            tools.all_definitions(),
            system_prompt,
        );

        Ok(Self {
            inner: Arc::new(GraphInner {
                selector: SubtaskSelector::new(agent_name),
                model_step,
                tool_step: ToolStep::new(tools),
                config,
            }),
        })
    }

    pub fn agent_name(&self) -> &str {
        self.inner.selector.agent_name()
    }

    pub fn config(&self) -> GraphConfig {
        self.inner.config
    }

    /// Run to completion and return the final state
    pub async fn invoke(&self, mut state: AgentState) -> Result<AgentState> {
        let mut node = next_node(GraphNode::Entry, &state);
        let mut step = 0;
        while node != GraphNode::Terminal {
            step += 1;
            self.inner.execute(node, step, &mut state).await?;
            node = next_node(node, &state);
        }
        Ok(state)
    }

    /// Run lazily, yielding each node's output as soon as it is produced
    pub fn stream_steps(&self, mut state: AgentState) -> StepStream {
        let inner = self.inner.clone();
        let stream = async_stream::stream! {
            let mut node = next_node(GraphNode::Entry, &state);
            let mut step = 0;
            while node != GraphNode::Terminal {
                step += 1;
                match inner.execute(node, step, &mut state).await {
                    Ok(update) => {
                        yield Ok(StepOutput { node, messages: update.messages });
                    }
                    Err(e) => {
                        yield Err(e);
                        break;
                    }
                }
                node = next_node(node, &state);
            }
            debug!(steps = step, "graph run finished");
        };
        Box::pin(stream)
    }

    /// Initial state for a conversation turn: the query as a user message and a
    /// single pending subtask owned by this agent
    pub fn seed_state(&self, input: &GraphInput) -> AgentState {
        let subtask = SubTask::new(
            format!("{}-1", input.session_id),
            input.message.query.clone(),
            self.agent_name(),
        );
        AgentState::new(vec![Message::user(&input.message.query)])
            .with_subtasks(vec![subtask])
            .with_client(input.client.clone())
    }
}

impl GraphInner {
    /// Execute one node under the step timeout and apply its update
    async fn execute(
        &self,
        node: GraphNode,
        step: usize,
        state: &mut AgentState,
    ) -> Result<StateUpdate> {
        if !state.is_last_step && self.config.is_last_step(step) {
            debug!(step, limit = self.config.recursion_limit, "step budget reached");
            state.is_last_step = true;
        }

        debug!(%node, step, "executing node");
        let view: &AgentState = state;
        let run = async move {
            match node {
                GraphNode::Selecting => self.selector.select(view),
                GraphNode::Model => self.model_step.run(view).await,
                GraphNode::Tools => self.tool_step.run(view).await,
                GraphNode::Entry | GraphNode::Terminal => Ok(StateUpdate::default()),
            }
        };

        let update = tokio::time::timeout(self.config.step_timeout, run)
            .await
            .map_err(|_| CompanionError::StepTimeout {
                node: node.to_string(),
                timeout: self.config.step_timeout,
            })??;

        state.apply(&update);
        if let Some(ref subtask_id) = update.completed_subtask {
            state.complete_subtask(subtask_id, self.selector.agent_name())?;
            debug!(subtask = %subtask_id, "subtask completed");
        }
        Ok(update)
    }
}

impl ConversationGraph for AgentGraph {
    fn stream(&self, input: GraphInput) -> GraphStream {
        info!(session_id = %input.session_id, agent = %self.agent_name(), "starting graph run");
        let state = self.seed_state(&input);
        self.stream_steps(state)
            .map(|output| -> Result<String> {
                let output = output?;
                let mut line = serde_json::to_string(&output)?;
                line.push('\n');
                Ok(line)
            })
            .boxed()
    }
}
