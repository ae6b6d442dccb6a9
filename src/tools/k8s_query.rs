//! Read-only cluster query tool

use async_trait::async_trait;

use crate::core::{CompanionError, Result, ToolDefinition};
use crate::tools::registry::{Tool, ToolContext};

/// Queries the cluster API with a GET request through the run's client
#[derive(Debug, Clone, Copy, Default)]
pub struct K8sQueryTool;

#[async_trait]
impl Tool for K8sQueryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::function(
            "k8s_query",
            "Query the state of objects in the Kubernetes cluster using a GET request to the API server",
            serde_json::json!({
                "type": "object",
                "properties": {
                    "uri": {
                        "type": "string",
                        "description": "API path, e.g. /api/v1/namespaces/default/pods"
                    }
                },
                "required": ["uri"]
            }),
        )
    }

    async fn call(&self, arguments: &serde_json::Value, ctx: &ToolContext) -> Result<String> {
        let uri = arguments
            .get("uri")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CompanionError::tool("k8s_query requires a 'uri' string argument"))?;

        let result = ctx.client.execute_get_api_request(uri).await.map_err(|e| {
            CompanionError::tool(format!("failed to execute GET {}: {}", uri, e))
        })?;

        Ok(serde_json::to_string(&result)?)
    }
}
