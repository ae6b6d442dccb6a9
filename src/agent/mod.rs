//! Agent module - the orchestration state machine
//!
//! Subtask selection, model invocation and tool execution, wired together by
//! [`AgentGraph`].

pub mod graph;
pub mod model_step;
pub mod prompts;
pub mod selector;
pub mod state;
pub mod tool_step;

pub use graph::{next_node, AgentGraph, GraphConfig, GraphNode, StepOutput, StepStream};
pub use model_step::ModelStep;
pub use selector::{SubtaskSelector, ALL_SUBTASKS_COMPLETED};
pub use state::{AgentState, StateUpdate, SubTask, SubTaskStatus};
pub use tool_step::ToolStep;
