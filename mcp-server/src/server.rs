//! JSON-RPC 2.0 dispatcher for the MCP tool server.
//!
//! Newline-delimited messages on stdin, responses on stdout. Notifications
//! get no reply.

use std::sync::atomic::{AtomicBool, Ordering};

use aicalendar_core::mcp::types::{
    CallToolParams, InitializeResult, JsonRpcRequest, JsonRpcResponse, ListToolsResult, McpTool,
    ServerCapabilities, ServerInfo, ToolsCapability, INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST,
    METHOD_NOT_FOUND, PARSE_ERROR,
};
use aicalendar_core::mcp::{DEFAULT_PROTOCOL_VERSION, SUPPORTED_PROTOCOL_VERSIONS};
use aicalendar_core::{LocalToolRegistry, ToolArguments, ToolCallResult, ToolError};
use serde_json::{json, Value};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

pub struct McpServer {
    registry: LocalToolRegistry,
    info: ServerInfo,
    initialized: AtomicBool,
}

impl McpServer {
    pub fn new(registry: LocalToolRegistry) -> Self {
        Self {
            registry,
            info: ServerInfo {
                name: "aicalendar-mcp".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            initialized: AtomicBool::new(false),
        }
    }

    pub fn registry(&self) -> &LocalToolRegistry {
        &self.registry
    }

    /// Whether the client has sent `notifications/initialized`
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Handle one raw line; `None` when nothing should be written back
    pub async fn handle_line(&self, line: &str) -> Option<String> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }

        let response = match serde_json::from_str::<JsonRpcRequest>(line) {
            Ok(req) => self.handle_request(req).await?,
            Err(e) => {
                warn!(target: "mcp_server", error = %e, "Unparseable message");
                JsonRpcResponse::failure(Value::Null, PARSE_ERROR, format!("Parse error: {e}"))
            }
        };

        match serde_json::to_string(&response) {
            Ok(s) => Some(s),
            Err(e) => {
                warn!(target: "mcp_server", error = %e, "Failed to serialize response");
                None
            }
        }
    }

    pub async fn handle_request(&self, req: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let Some(id) = req.id.clone() else {
            self.handle_notification(&req.method);
            return None;
        };
        if req.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::failure(
                id,
                INVALID_REQUEST,
                "Invalid Request: jsonrpc must be \"2.0\"",
            ));
        }

        debug!(target: "mcp_server", method = %req.method, "Request");
        let result = match req.method.as_str() {
            "initialize" => Ok(self.initialize(req.params.as_ref())),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => self.call_tool(req.params).await,
            other => Err((METHOD_NOT_FOUND, format!("Method not found: {other}"))),
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err((code, message)) => JsonRpcResponse::failure(id, code, message),
        })
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" => {
                self.initialized.store(true, Ordering::Release);
                info!(target: "mcp_server", "Client initialized");
            }
            other => debug!(target: "mcp_server", method = %other, "Ignoring notification"),
        }
    }

    fn initialize(&self, params: Option<&Value>) -> Value {
        let requested = params
            .and_then(|p| p.get("protocolVersion"))
            .and_then(Value::as_str);
        let protocol_version = match requested {
            Some(v) if SUPPORTED_PROTOCOL_VERSIONS.contains(&v) => v.to_string(),
            _ => DEFAULT_PROTOCOL_VERSION.to_string(),
        };
        info!(target: "mcp_server", ?requested, negotiated = %protocol_version, "Initialize");

        let result = InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities {
                tools: Some(ToolsCapability {
                    list_changed: Some(false),
                }),
                experimental: None,
            },
            server_info: self.info.clone(),
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    fn list_tools(&self) -> Value {
        let result = ListToolsResult {
            tools: self
                .registry
                .descriptors()
                .into_iter()
                .map(McpTool::from)
                .collect(),
            next_cursor: None,
        };
        serde_json::to_value(result).unwrap_or(Value::Null)
    }

    async fn call_tool(&self, params: Option<Value>) -> Result<Value, (i32, String)> {
        let params: CallToolParams = params
            .ok_or_else(|| "Missing params".to_string())
            .and_then(|p| serde_json::from_value(p).map_err(|e| e.to_string()))
            .map_err(|e| (INVALID_PARAMS, format!("Invalid params: {e}")))?;

        let arguments = match params.arguments {
            None | Some(Value::Null) => ToolArguments::new(),
            Some(Value::Object(map)) => ToolArguments::from(map),
            Some(_) => {
                return Err((INVALID_PARAMS, "Tool arguments must be an object".into()));
            }
        };

        let result = match self.registry.invoke(&params.name, arguments).await {
            Ok(text) => ToolCallResult::text(text),
            Err(ToolError::NotFound(name)) => {
                return Err((INVALID_PARAMS, format!("Unknown tool: {name}")));
            }
            Err(ToolError::InvalidArguments(msg)) => {
                debug!(target: "mcp_server", tool = %params.name, reason = %msg, "Rejected tool arguments");
                ToolCallResult::error(
                    json!({ "error": "Invalid arguments", "message": msg }).to_string(),
                )
            }
            Err(ToolError::ExecutionFailed(text)) => ToolCallResult::error(text),
            Err(other) => ToolCallResult::error(json!({ "error": other.to_string() }).to_string()),
        };
        serde_json::to_value(result).map_err(|e| (INTERNAL_ERROR, e.to_string()))
    }

    /// Serve until `reader` reaches EOF
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if let Some(mut out) = self.handle_line(&line).await {
                out.push('\n');
                writer.write_all(out.as_bytes()).await?;
                writer.flush().await?;
            }
        }
        info!(target: "mcp_server", "Input closed; shutting down");
        Ok(())
    }

    pub async fn run_stdio(&self) -> std::io::Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.run(stdin, tokio::io::stdout()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aicalendar_core::{Tool, ToolResult};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> String {
            "echo".into()
        }

        fn description(&self) -> String {
            "Echo the message".into()
        }

        fn parameters(&self) -> Value {
            json!({"type": "object", "properties": {"message": {"type": "string"}}, "required": ["message"]})
        }

        async fn call(&self, arguments: ToolArguments) -> ToolResult<String> {
            match arguments.get_str("message") {
                Some("fail") => Err(ToolError::ExecutionFailed(
                    json!({"error": "Failed to echo", "statusCode": 503}).to_string(),
                )),
                Some(m) => Ok(m.to_string()),
                None => Err(ToolError::InvalidArguments("message is required".into())),
            }
        }
    }

    fn server() -> McpServer {
        let registry = LocalToolRegistry::new();
        registry.register(Arc::new(EchoTool));
        McpServer::new(registry)
    }

    async fn call(server: &McpServer, msg: Value) -> Value {
        let out = server.handle_line(&msg.to_string()).await.unwrap();
        serde_json::from_str(&out).unwrap()
    }

    #[tokio::test]
    async fn initialize_negotiates_version() {
        let s = server();
        let v = call(
            &s,
            json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {
                "protocolVersion": "2024-11-05",
                "capabilities": {},
                "clientInfo": {"name": "test", "version": "0"}
            }}),
        )
        .await;
        assert_eq!(v["id"], 1);
        assert_eq!(v["result"]["protocolVersion"], "2024-11-05");
        assert_eq!(v["result"]["serverInfo"]["name"], "aicalendar-mcp");
        assert!(v["result"]["capabilities"]["tools"].is_object());

        let v = call(
            &s,
            json!({"jsonrpc": "2.0", "id": 2, "method": "initialize", "params": {"protocolVersion": "2099-01-01"}}),
        )
        .await;
        assert_eq!(v["result"]["protocolVersion"], DEFAULT_PROTOCOL_VERSION);
    }

    #[tokio::test]
    async fn initialized_notification_has_no_reply() {
        let s = server();
        let out = s
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await;
        assert!(out.is_none());
        assert!(s.is_initialized());
    }

    #[tokio::test]
    async fn lists_tools_with_schema() {
        let v = call(&server(), json!({"jsonrpc": "2.0", "id": "a", "method": "tools/list"})).await;
        assert_eq!(v["id"], "a");
        assert_eq!(v["result"]["tools"][0]["name"], "echo");
        assert_eq!(v["result"]["tools"][0]["inputSchema"]["required"][0], "message");
    }

    #[tokio::test]
    async fn calls_tool() {
        let v = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call",
                   "params": {"name": "echo", "arguments": {"message": "hi"}}}),
        )
        .await;
        assert_eq!(v["result"]["content"][0]["type"], "text");
        assert_eq!(v["result"]["content"][0]["text"], "hi");
        assert!(v["result"].get("isError").is_none());
    }

    #[tokio::test]
    async fn tool_failure_is_an_error_result() {
        let v = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call",
                   "params": {"name": "echo", "arguments": {"message": "fail"}}}),
        )
        .await;
        assert_eq!(v["result"]["isError"], true);
        let text: Value =
            serde_json::from_str(v["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["statusCode"], 503);
    }

    #[tokio::test]
    async fn rejected_arguments_are_an_error_result() {
        let v = call(
            &server(),
            json!({"jsonrpc": "2.0", "id": 9, "method": "tools/call",
                   "params": {"name": "echo", "arguments": {"message": null}}}),
        )
        .await;
        assert!(v.get("error").is_none());
        assert_eq!(v["result"]["isError"], true);
        let text: Value =
            serde_json::from_str(v["result"]["content"][0]["text"].as_str().unwrap()).unwrap();
        assert_eq!(text["error"], "Invalid arguments");
        assert_eq!(text["message"], "message is required");
    }

    #[tokio::test]
    async fn unknown_tool_and_bad_params_are_invalid_params() {
        let s = server();
        let v = call(
            &s,
            json!({"jsonrpc": "2.0", "id": 5, "method": "tools/call", "params": {"name": "delete_everything"}}),
        )
        .await;
        assert_eq!(v["error"]["code"], INVALID_PARAMS);

        let v = call(
            &s,
            json!({"jsonrpc": "2.0", "id": 6, "method": "tools/call", "params": {"name": "echo", "arguments": [1]}}),
        )
        .await;
        assert_eq!(v["error"]["code"], INVALID_PARAMS);

        let v = call(&s, json!({"jsonrpc": "2.0", "id": 7, "method": "tools/call", "params": {"arguments": {}}})).await;
        assert_eq!(v["error"]["code"], INVALID_PARAMS);
    }

    #[tokio::test]
    async fn unknown_method_and_garbage() {
        let s = server();
        let v = call(&s, json!({"jsonrpc": "2.0", "id": 8, "method": "resources/list"})).await;
        assert_eq!(v["error"]["code"], METHOD_NOT_FOUND);

        let out = s.handle_line("{not json").await.unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["error"]["code"], PARSE_ERROR);
        assert_eq!(v["id"], Value::Null);

        assert!(s.handle_line("   ").await.is_none());
    }

    #[tokio::test]
    async fn run_answers_each_request_line() {
        let s = server();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"ping"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n"
        );
        let mut out = Vec::new();
        s.run(input.as_bytes(), &mut out).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["id"], 1);
        assert_eq!(lines[1]["id"], 2);
    }
}
