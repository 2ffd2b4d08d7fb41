/// Tool registry backed by an MCP server
///
/// The server connection is established lazily by the first caller and then
/// shared. Concurrent first callers wait on the same initialisation; a failed
/// attempt leaves the cell empty so a later call retries.
use super::client::McpClient;
use super::types::{McpError, McpServerConfig};
use crate::tools::{
    ToolArguments, ToolCallResult, ToolDescriptor, ToolError, ToolRegistry, ToolResult,
};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info};

pub struct McpToolRegistry {
    config: McpServerConfig,
    client: OnceCell<Arc<McpClient>>,
}

impl McpToolRegistry {
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            client: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.client.initialized()
    }

    /// Shared connection, establishing it on first use
    pub async fn client(&self) -> Result<Arc<McpClient>, McpError> {
        self.client
            .get_or_try_init(|| async {
                if let Err(e) = self.config.validate_protocol_version() {
                    error!(
                        target: "mcp_registry",
                        server = %self.config.name,
                        error = %e,
                        "Invalid protocol version"
                    );
                    return Err(McpError::Protocol(e));
                }

                info!(target: "mcp_registry", server = %self.config.name, "Starting MCP server");
                let client = Arc::new(McpClient::new(self.config.clone()));
                client.connect().await.map_err(|e| {
                    error!(
                        target: "mcp_registry",
                        server = %self.config.name,
                        error = %e,
                        "Failed to initialize MCP client"
                    );
                    e
                })?;
                Ok(client)
            })
            .await
            .map(Arc::clone)
    }

    /// Disconnect the shared client if it was ever established
    pub async fn shutdown(&self) {
        if let Some(client) = self.client.get() {
            let _ = client.disconnect().await;
        }
    }
}

impl From<McpError> for ToolError {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Timeout => ToolError::Timeout,
            McpError::ToolNotFound(name) => ToolError::NotFound(name),
            McpError::InvalidParams(msg) => ToolError::InvalidArguments(msg),
            other @ (McpError::Transport(_) | McpError::Io(_)) => {
                ToolError::Connection(other.to_string())
            }
            other => ToolError::ExecutionFailed(other.to_string()),
        }
    }
}

#[async_trait]
impl ToolRegistry for McpToolRegistry {
    async fn list_tools(&self) -> ToolResult<Vec<ToolDescriptor>> {
        let client = self.client().await?;
        let tools = client.list_tools().await?;
        debug!(
            target: "mcp_registry",
            server = %self.config.name,
            count = tools.len(),
            "Discovered tools"
        );
        Ok(tools.into_iter().map(ToolDescriptor::from).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> ToolResult<ToolCallResult> {
        let client = self.client().await?;
        Ok(client.call_tool(name, Some(arguments.into_value())).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &str, protocol_version: Option<&str>) -> McpServerConfig {
        McpServerConfig {
            name: "calendar".to_string(),
            command: command.to_string(),
            args: vec![],
            env: None,
            cwd: None,
            protocol_version: protocol_version.map(|s| s.to_string()),
            request_timeout_ms: 1_000,
        }
    }

    #[tokio::test]
    async fn failed_connection_is_retried_on_next_call() {
        let registry = McpToolRegistry::new(config("nonexistent-command-12345", None));

        let first = registry.list_tools().await.unwrap_err();
        assert!(matches!(first, ToolError::Connection(_)));
        assert!(!registry.is_initialized());

        let second = registry.list_tools().await.unwrap_err();
        assert!(matches!(second, ToolError::Connection(_)));
        assert!(!registry.is_initialized());
    }

    #[tokio::test]
    async fn unsupported_protocol_version_is_rejected_before_spawn() {
        let registry = McpToolRegistry::new(config("nonexistent-command-12345", Some("1999-01-01")));
        let err = registry.client().await.err().unwrap();
        assert_eq!(err.code(), "PROTOCOL_ERROR");
    }

    #[test]
    fn mcp_errors_map_to_tool_errors() {
        assert!(matches!(ToolError::from(McpError::Timeout), ToolError::Timeout));
        assert!(matches!(
            ToolError::from(McpError::ToolNotFound("x".into())),
            ToolError::NotFound(_)
        ));
        assert!(matches!(
            ToolError::from(McpError::ServerError("boom".into())),
            ToolError::ExecutionFailed(_)
        ));
    }
}
