use super::error::{ToolError, ToolResult};
use super::traits::{Tool, ToolRegistry};
use super::types::{ToolArguments, ToolCallResult, ToolDescriptor};
use async_trait::async_trait;
use dashmap::DashMap;
use opentelemetry::{
    global,
    metrics::{Counter, Histogram},
    KeyValue,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// A registry of in-process tools
#[derive(Clone)]
pub struct LocalToolRegistry {
    tools: Arc<DashMap<String, Arc<dyn Tool>>>,
    call_timeout: Duration,

    // OpenTelemetry metrics
    invocations_counter: Counter<u64>,
    timeouts_counter: Counter<u64>,
    invoke_latency: Histogram<f64>,
}

impl Default for LocalToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalToolRegistry {
    pub fn new() -> Self {
        Self::with_timeout(Duration::from_secs(30))
    }

    pub fn with_timeout(call_timeout: Duration) -> Self {
        let meter = global::meter("aicalendar.tool_registry");

        let invocations_counter = meter
            .u64_counter("aicalendar.tool_registry.invocations_total")
            .with_description("Total number of tool invocations")
            .init();

        let timeouts_counter = meter
            .u64_counter("aicalendar.tool_registry.timeouts_total")
            .with_description("Total number of tool timeouts")
            .init();

        let invoke_latency = meter
            .f64_histogram("aicalendar.tool_registry.invoke_latency_ms")
            .with_description("Tool invocation latency in milliseconds")
            .init();

        Self {
            tools: Arc::new(DashMap::new()),
            call_timeout,
            invocations_counter,
            timeouts_counter,
            invoke_latency,
        }
    }

    /// Register a new tool, replacing any tool with the same name
    pub fn register(&self, tool: Arc<dyn Tool>) {
        let name = tool.name();
        info!(target: "tool_registry", tool = %name, "Registering tool");
        self.tools.insert(name, tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|t| t.clone())
    }

    /// Descriptors of all registered tools, sorted by name
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        let mut out: Vec<ToolDescriptor> = self.tools.iter().map(|t| t.descriptor()).collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Call a tool by name with timeout
    #[tracing::instrument(skip(self, arguments), fields(tool.name = %name))]
    pub async fn invoke(&self, name: &str, arguments: ToolArguments) -> ToolResult<String> {
        let start_time = std::time::Instant::now();

        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        debug!(target: "tool_registry", tool = %name, "Invoking tool");

        let result = match timeout(self.call_timeout, tool.call(arguments)).await {
            Ok(res) => res,
            Err(_) => {
                warn!(target: "tool_registry", tool = %name, "Tool execution timed out");
                self.timeouts_counter
                    .add(1, &[KeyValue::new("tool", name.to_string())]);
                Err(ToolError::Timeout)
            }
        };

        let elapsed_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        self.invoke_latency
            .record(elapsed_ms, &[KeyValue::new("tool", name.to_string())]);

        let status = match &result {
            Ok(_) => "success",
            Err(e) => {
                warn!(target: "tool_registry", tool = %name, error = %e, "Tool execution failed");
                "error"
            }
        };
        self.invocations_counter.add(
            1,
            &[
                KeyValue::new("tool", name.to_string()),
                KeyValue::new("status", status),
            ],
        );

        result
    }
}

#[async_trait]
impl ToolRegistry for LocalToolRegistry {
    async fn list_tools(&self) -> ToolResult<Vec<ToolDescriptor>> {
        Ok(self.descriptors())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: ToolArguments,
    ) -> ToolResult<ToolCallResult> {
        self.invoke(name, arguments).await.map(ToolCallResult::text)
    }
}
