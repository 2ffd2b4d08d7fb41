// AI Calendar Core Library
// Chat orchestration: intent detection, MCP tool execution, reply drafting

pub mod chat;
pub mod config;
pub mod llm;
pub mod mcp;
pub mod telemetry;
pub mod tools;

// Export core types
pub use chat::{
    ChatOrchestrator, ChatReply, Confidence, Intent, OrchestratorOptions, ReplyPath,
    StageOutcome, UserIntention,
};
pub use config::AppConfig;
pub use llm::{ChatMessage, ChatRole, CompletionClient, LlmClient, LlmClientConfig};
pub use mcp::{McpClient, McpError, McpServerConfig, McpToolRegistry};
pub use tools::{
    LocalToolRegistry, Tool, ToolArguments, ToolCallResult, ToolContent, ToolDescriptor,
    ToolError, ToolRegistry, ToolResult,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CalendarError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
pub type Result<T> = std::result::Result<T, CalendarError>;
