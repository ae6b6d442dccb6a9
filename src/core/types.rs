//! Shared types used across Companion modules
//!
//! Contains message structures, tool definitions, and the inbound request shape.

use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
    /// Transport-internal marker (routing notes, stream bookkeeping); never sent to a model
    Control,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
            Role::Control => write!(f, "control"),
        }
    }
}

/// A message in a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Identity token assigned by the model, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Role of the message sender
    pub role: Role,
    /// Content of the message
    pub content: String,
    /// Agent the message is attributed to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls requested by the assistant
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// For tool results, the call this message answers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: None,
            role,
            content: content.into(),
            name: None,
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a transport-internal control message
    pub fn control(content: impl Into<String>) -> Self {
        Self::with_role(Role::Control, content)
    }

    /// Create a tool result message answering `tool_call_id`
    pub fn tool(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: Some(tool_call_id.into()),
            ..Self::with_role(Role::Tool, content)
        }
    }

    /// Attribute the message to an agent
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the identity token
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Attach tool calls
    pub fn with_tool_calls(mut self, tool_calls: Vec<ToolCall>) -> Self {
        self.tool_calls = tool_calls;
        self
    }

    /// True for an assistant message requesting at least one tool call
    pub fn has_tool_calls(&self) -> bool {
        self.role == Role::Assistant && !self.tool_calls.is_empty()
    }
}

/// Drop messages that only matter to the transport, keeping order.
pub fn filter_messages(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .filter(|m| m.role != Role::Control)
        .cloned()
        .collect()
}

/// A tool call made by the LLM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id, echoed back on the tool result
    pub id: String,
    /// Name of the tool to invoke
    pub name: String,
    /// JSON arguments for the tool
    pub arguments: serde_json::Value,
}

impl ToolCall {
    /// Create a new tool call
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        arguments: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }

    /// Get a string argument by key
    pub fn get_string(&self, key: &str) -> Option<String> {
        self.arguments
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }
}

/// Definition of a tool that can be called by the LLM
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Type of tool (always "function" for now)
    #[serde(rename = "type")]
    pub tool_type: String,
    /// Function details
    pub function: FunctionDefinition,
}

/// Function definition within a tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    /// Name of the function
    pub name: String,
    /// Description of what the function does
    pub description: String,
    /// JSON Schema for the parameters
    pub parameters: serde_json::Value,
}

impl ToolDefinition {
    /// Create a new function tool definition
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            tool_type: "function".to_string(),
            function: FunctionDefinition {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Result of executing one tool call
#[derive(Debug, Clone)]
pub struct ToolResult {
    /// Call this result answers
    pub tool_call_id: String,
    /// Name of the tool that was executed
    pub tool_name: String,
    /// Whether the execution was successful
    pub success: bool,
    /// Output from the tool
    pub output: String,
}

impl ToolResult {
    /// Create a successful result
    pub fn success(call: &ToolCall, output: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: true,
            output: output.into(),
        }
    }

    /// Create a failed result
    pub fn failure(call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.name.clone(),
            success: false,
            output: error.into(),
        }
    }
}

impl From<ToolResult> for Message {
    fn from(result: ToolResult) -> Self {
        Message::tool(result.tool_call_id, result.output).named(result.tool_name)
    }
}

/// An inbound user request, optionally scoped to a cluster resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserMessage {
    /// The user's question
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_api_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

impl UserMessage {
    /// Create a request with only a query
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_messages_drops_control() {
        let messages = vec![
            Message::user("hi"),
            Message::control("routed to k8s"),
            Message::assistant("hello"),
        ];
        let filtered = filter_messages(&messages);
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].role, Role::User);
        assert_eq!(filtered[1].role, Role::Assistant);
    }

    #[test]
    fn test_has_tool_calls_only_for_assistant() {
        let call = ToolCall::new("c1", "k8s_query", serde_json::json!({"uri": "/api"}));
        let assistant = Message::assistant("").with_tool_calls(vec![call.clone()]);
        assert!(assistant.has_tool_calls());

        let user = Message::user("").with_tool_calls(vec![call]);
        assert!(!user.has_tool_calls());
    }

    #[test]
    fn test_tool_result_into_message() {
        let call = ToolCall::new("c7", "k8s_query", serde_json::json!({}));
        let msg: Message = ToolResult::success(&call, "{}").into();
        assert_eq!(msg.role, Role::Tool);
        assert_eq!(msg.tool_call_id.as_deref(), Some("c7"));
        assert_eq!(msg.name.as_deref(), Some("k8s_query"));
    }

    #[test]
    fn test_message_serialization_skips_empty() {
        let json = serde_json::to_value(Message::user("hello")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hello"}));
    }
}
