//! Tools module - Tool implementations for the agent
//!
//! Contains the cluster query tool and the tool registry.

pub mod k8s_query;
pub mod registry;

pub use k8s_query::K8sQueryTool;
pub use registry::{Tool, ToolContext, ToolRegistry};
