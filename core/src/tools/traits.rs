use super::error::ToolResult;
use super::types::{ToolArguments, ToolCallResult, ToolDescriptor};
use async_trait::async_trait;
use serde_json::Value;

/// An in-process tool (served locally or exposed over MCP)
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of the tool (e.g., "get_calendar_events")
    fn name(&self) -> String;

    /// A human-readable description of what the tool does
    fn description(&self) -> String;

    /// The JSON Schema for the tool's arguments
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments, returning text content
    async fn call(&self, arguments: ToolArguments) -> ToolResult<String>;

    fn descriptor(&self) -> ToolDescriptor {
        ToolDescriptor::new(self.name(), self.description(), self.parameters())
    }
}

/// Source of tools for the chat orchestrator: lists tool descriptors and
/// executes a tool by name.
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    async fn list_tools(&self) -> ToolResult<Vec<ToolDescriptor>>;

    async fn call_tool(&self, name: &str, arguments: ToolArguments)
        -> ToolResult<ToolCallResult>;
}
