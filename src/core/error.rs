//! Custom error types for Companion
//!
//! Provides a unified error handling system across all modules.

use std::time::Duration;
use thiserror::Error;

/// Main error type for Companion operations
#[derive(Error, Debug)]
pub enum CompanionError {
    /// Configuration errors (missing capability, invalid option)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model identifier not in the supported set
    #[error("Unsupported model '{name}'. Valid models: {}", .valid.join(", "))]
    UnsupportedModel { name: String, valid: Vec<String> },

    /// Model invocation errors
    #[error("Model error: {0}")]
    Model(String),

    /// Tool execution errors
    #[error("Tool execution error: {0}")]
    ToolExecution(String),

    /// A graph step ran past its wall-clock budget
    #[error("Step '{node}' timed out after {timeout:?}")]
    StepTimeout { node: String, timeout: Duration },

    /// History store errors
    #[error("History store error: {0}")]
    History(String),

    /// Cluster API errors
    #[error("Cluster error: {0}")]
    Cluster(String),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for other cases
    #[error("{0}")]
    Other(String),
}

/// Convenience Result type for Companion operations
pub type Result<T> = std::result::Result<T, CompanionError>;

impl CompanionError {
    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a model error
    pub fn model(msg: impl Into<String>) -> Self {
        Self::Model(msg.into())
    }

    /// Create a tool execution error
    pub fn tool(msg: impl Into<String>) -> Self {
        Self::ToolExecution(msg.into())
    }

    /// Create a history store error
    pub fn history(msg: impl Into<String>) -> Self {
        Self::History(msg.into())
    }

    /// Create a cluster error
    pub fn cluster(msg: impl Into<String>) -> Self {
        Self::Cluster(msg.into())
    }

    /// Whether this error came from a single model or tool invocation.
    pub fn is_step_failure(&self) -> bool {
        matches!(
            self,
            Self::Model(_)
                | Self::ToolExecution(_)
                | Self::StepTimeout { .. }
                | Self::Cluster(_)
                | Self::Http(_)
        )
    }

    /// Whether this error was raised before any model or tool call.
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnsupportedModel { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_model_lists_valid_set() {
        let err = CompanionError::UnsupportedModel {
            name: "gpt-5".to_string(),
            valid: vec!["qwen3:8b".to_string(), "llama3.1:8b".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Unsupported model 'gpt-5'. Valid models: qwen3:8b, llama3.1:8b"
        );
        assert!(err.is_config());
    }

    #[test]
    fn test_step_failure_classification() {
        let timeout = CompanionError::StepTimeout {
            node: "model".to_string(),
            timeout: Duration::from_secs(3),
        };
        assert_eq!(timeout.to_string(), "Step 'model' timed out after 3s");
        assert!(timeout.is_step_failure());
        assert!(CompanionError::tool("boom").is_step_failure());
        assert!(!CompanionError::config("missing").is_step_failure());
        assert!(!CompanionError::history("down").is_step_failure());
    }
}
