use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Timeout")]
    Timeout,
}

pub type ToolResult<T> = Result<T, ToolError>;
