/// Model Context Protocol (MCP) integration
///
/// This module provides MCP client functionality to connect to the calendar
/// tool server, discover its tools, and invoke them for the chat orchestrator.
///
/// MCP Protocol Spec: https://spec.modelcontextprotocol.io/specification/
///
/// Architecture:
/// - `client`: Low-level MCP client (stdio transport)
/// - `registry`: `ToolRegistry` over a lazily shared MCP connection
/// - `types`: MCP protocol types (JSON-RPC 2.0 based), shared with the server side
pub mod client;
pub mod registry;
pub mod types;

pub use client::McpClient;
pub use registry::McpToolRegistry;
pub use types::{
    McpError, McpServerConfig, McpTool, DEFAULT_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS,
};
