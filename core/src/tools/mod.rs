pub mod error;
pub mod registry;
pub mod traits;
pub mod types;

// Re-export common types
pub use error::{ToolError, ToolResult};
pub use registry::LocalToolRegistry;
pub use traits::{Tool, ToolRegistry};
pub use types::{ResourceContents, ToolArguments, ToolCallResult, ToolContent, ToolDescriptor};
