//! Query execution through an MCP tool.

use std::sync::Arc;

use async_trait::async_trait;
use invora_shared::TenantId;
use serde_json::json;

use super::client::McpClient;
use crate::assistant::{ExecutorError, QueryExecutor, QueryRows};

/// Runs validated SQL by calling a tool that takes `{"sql": ...}` and
/// returns a JSON array of rows as its first text block.
///
/// The tool process cannot set the row-level security context, so tenant
/// isolation on this path rests on the validated `tenant_id` predicates.
/// The guard only accepts them as AND conditions of a WHERE or ON clause
/// with no OR at the same level, but it is a pattern check, not a parser.
/// Point the tool at a role that can only see tenant data it may return.
pub struct McpQueryExecutor {
    client: Arc<McpClient>,
    tool_name: String,
}

impl McpQueryExecutor {
    /// Creates an executor for a tool.
    #[must_use]
    pub fn new(client: Arc<McpClient>, tool_name: impl Into<String>) -> Self {
        Self {
            client,
            tool_name: tool_name.into(),
        }
    }
}

#[async_trait]
impl QueryExecutor for McpQueryExecutor {
    async fn execute(&self, tenant_id: TenantId, sql: &str) -> Result<QueryRows, ExecutorError> {
        tracing::debug!(%tenant_id, tool = %self.tool_name, "Executing query through MCP");
        let result = self
            .client
            .call_tool(&self.tool_name, json!({"sql": sql}))
            .await
            .map_err(|e| ExecutorError::Transport(e.to_string()))?;

        let text = result.first_text().unwrap_or_default();
        if result.is_error {
            return Err(ExecutorError::Tool(text.to_string()));
        }
        if text.trim().is_empty() {
            return Err(ExecutorError::InvalidResult(
                "tool returned no text content".to_string(),
            ));
        }

        let value: serde_json::Value = serde_json::from_str(text)
            .map_err(|e| ExecutorError::InvalidResult(e.to_string()))?;
        QueryRows::from_json_array(value)
    }
}
