/// MCP Client implementation
///
/// Provides low-level communication with MCP servers via stdio transport.
/// Supports JSON-RPC 2.0 protocol with proper request/response correlation.
use super::types::*;
use serde_json::json;
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::time::{timeout, Duration};
use tracing::{debug, error, info, warn};

/// MCP client for communicating with a single MCP server
pub struct McpClient {
    /// Server configuration
    config: McpServerConfig,
    /// Child process handle
    process: Arc<Mutex<Option<Child>>>,
    /// Stdin writer
    stdin: Arc<Mutex<Option<ChildStdin>>>,
    /// Request ID counter
    request_id: Arc<AtomicU64>,
    /// Pending requests: request_id -> response channel
    pending: Arc<Mutex<HashMap<u64, oneshot::Sender<JsonRpcResponse>>>>,
    /// Cleared when the server's stdout closes
    connected: Arc<AtomicBool>,
    /// Server info after initialization
    server_info: Arc<Mutex<Option<ServerInfo>>>,
}

impl McpClient {
    /// Create a new MCP client with configuration
    pub fn new(config: McpServerConfig) -> Self {
        Self {
            config,
            process: Arc::new(Mutex::new(None)),
            stdin: Arc::new(Mutex::new(None)),
            request_id: Arc::new(AtomicU64::new(1)),
            pending: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            server_info: Arc::new(Mutex::new(None)),
        }
    }

    pub fn config(&self) -> &McpServerConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Start the MCP server process and initialize connection
    pub async fn connect(&self) -> Result<(), McpError> {
        info!(
            target: "mcp_client",
            server = %self.config.name,
            command = %self.config.command,
            "Connecting to MCP server"
        );

        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(ref env) = self.config.env {
            for (key, val) in env {
                cmd.env(key, val);
            }
        }

        if let Some(ref cwd) = self.config.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = cmd.spawn().map_err(|e| {
            error!(target: "mcp_client", error = %e, "Failed to spawn MCP server process");
            McpError::Transport(format!("Failed to spawn process: {}", e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdin".to_string()))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            self.spawn_stderr_forwarder(stderr);
        }

        *self.stdin.lock().await = Some(stdin);
        *self.process.lock().await = Some(child);
        self.connected.store(true, Ordering::SeqCst);

        self.spawn_reader(stdout);

        let init_result = match self.initialize().await {
            Ok(r) => r,
            Err(e) => {
                let _ = self.disconnect().await;
                return Err(e);
            }
        };
        self.notify("notifications/initialized", None).await?;

        *self.server_info.lock().await = Some(init_result.server_info.clone());

        info!(
            target: "mcp_client",
            server = %self.config.name,
            server_name = %init_result.server_info.name,
            server_version = %init_result.server_info.version,
            protocol_version = %init_result.protocol_version,
            "MCP server connected and initialized"
        );

        Ok(())
    }

    /// Disconnect from the MCP server
    pub async fn disconnect(&self) -> Result<(), McpError> {
        info!(target: "mcp_client", server = %self.config.name, "Disconnecting from MCP server");

        // Close stdin to signal shutdown
        if let Some(mut stdin) = self.stdin.lock().await.take() {
            let _ = stdin.shutdown().await;
        }

        if let Some(mut child) = self.process.lock().await.take() {
            let _ = child.kill().await;
            let _ = child.wait().await;
        }

        self.connected.store(false, Ordering::SeqCst);
        Ok(())
    }

    /// Send initialize request
    async fn initialize(&self) -> Result<InitializeResult, McpError> {
        let params = InitializeParams {
            protocol_version: self.config.protocol_version().to_string(),
            capabilities: ClientCapabilities::default(),
            client_info: ClientInfo {
                name: "aicalendar".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let result = self.send_request("initialize", Some(json!(params))).await?;

        serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Invalid initialize result: {}", e)))
    }

    /// List available tools, following pagination cursors
    pub async fn list_tools(&self) -> Result<Vec<McpTool>, McpError> {
        debug!(target: "mcp_client", server = %self.config.name, "Listing tools");

        let mut all_tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = ListToolsParams { cursor };
            let result = self.send_request("tools/list", Some(json!(params))).await?;

            let list_result: ListToolsResult = serde_json::from_value(result)
                .map_err(|e| McpError::Protocol(format!("Invalid tools/list result: {}", e)))?;

            all_tools.extend(list_result.tools);

            if list_result.next_cursor.is_none() {
                break;
            }
            cursor = list_result.next_cursor;
        }

        debug!(
            target: "mcp_client",
            server = %self.config.name,
            count = all_tools.len(),
            "Listed tools"
        );

        Ok(all_tools)
    }

    /// Call a tool
    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Option<serde_json::Value>,
    ) -> Result<ToolCallResult, McpError> {
        debug!(target: "mcp_client", server = %self.config.name, tool = %name, "Calling tool");

        let params = CallToolParams {
            name: name.to_string(),
            arguments,
        };

        let result = self.send_request("tools/call", Some(json!(params))).await?;

        let call_result: ToolCallResult = serde_json::from_value(result)
            .map_err(|e| McpError::Protocol(format!("Invalid tools/call result: {}", e)))?;

        if call_result.is_error() {
            debug!(
                target: "mcp_client",
                server = %self.config.name,
                tool = %name,
                "Tool returned error"
            );
        }

        Ok(call_result)
    }

    /// Send a JSON-RPC notification (no response expected)
    async fn notify(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<(), McpError> {
        let notification = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: None,
            method: method.to_string(),
            params,
        };
        self.write_line(&notification).await
    }

    /// Send a JSON-RPC request and wait for response
    async fn send_request(
        &self,
        method: &str,
        params: Option<serde_json::Value>,
    ) -> Result<serde_json::Value, McpError> {
        let id = self.request_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        self.pending.lock().await.insert(id, tx);

        let request = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(id)),
            method: method.to_string(),
            params,
        };

        if let Err(e) = self.write_line(&request).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let wait = Duration::from_millis(self.config.request_timeout_ms);
        let response = match timeout(wait, rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(McpError::Transport("Response channel closed".to_string()));
            }
            Err(_) => {
                warn!(target: "mcp_client", method = %method, "Request timeout");
                self.pending.lock().await.remove(&id);
                return Err(McpError::Timeout);
            }
        };

        if let Some(error) = response.error {
            return Err(match error.code {
                INVALID_PARAMS => McpError::InvalidParams(error.message),
                _ => McpError::ServerError(format!("{} (code: {})", error.message, error.code)),
            });
        }

        response
            .result
            .ok_or_else(|| McpError::Protocol("Missing result in response".to_string()))
    }

    async fn write_line(&self, message: &JsonRpcRequest) -> Result<(), McpError> {
        let mut line = serde_json::to_string(message)?;
        line.push('\n');

        let mut stdin_guard = self.stdin.lock().await;
        let stdin = stdin_guard
            .as_mut()
            .ok_or_else(|| McpError::Transport("stdin not available".to_string()))?;

        stdin.write_all(line.as_bytes()).await.map_err(|e| {
            error!(target: "mcp_client", error = %e, "Failed to write request");
            McpError::Io(e)
        })?;

        stdin.flush().await.map_err(|e| {
            error!(target: "mcp_client", error = %e, "Failed to flush stdin");
            McpError::Io(e)
        })
    }

    /// Spawn stdout reader task
    fn spawn_reader(&self, stdout: ChildStdout) {
        let pending = Arc::clone(&self.pending);
        let connected = Arc::clone(&self.connected);
        let server_name = self.config.name.clone();

        tokio::spawn(async move {
            let reader = BufReader::new(stdout);
            let mut lines = reader.lines();

            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().is_empty() {
                    continue;
                }

                match serde_json::from_str::<JsonRpcResponse>(&line) {
                    Ok(response) => {
                        if let Some(id) = response.id.as_u64() {
                            if let Some(tx) = pending.lock().await.remove(&id) {
                                let _ = tx.send(response);
                            } else {
                                warn!(
                                    target: "mcp_client",
                                    server = %server_name,
                                    id = id,
                                    "Received response for unknown request"
                                );
                            }
                        }
                    }
                    Err(e) => {
                        warn!(
                            target: "mcp_client",
                            server = %server_name,
                            error = %e,
                            line = %line,
                            "Failed to parse JSON-RPC response"
                        );
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            // Dropping the senders wakes every waiter with a closed channel
            pending.lock().await.clear();
            debug!(target: "mcp_client", server = %server_name, "Stdout reader exited");
        });
    }

    fn spawn_stderr_forwarder(&self, stderr: ChildStderr) {
        let server_name = self.config.name.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!(target: "mcp_server_stderr", server = %server_name, "{}", line);
            }
        });
    }

    /// Get server info
    pub async fn server_info(&self) -> Option<ServerInfo> {
        self.server_info.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &str) -> McpServerConfig {
        McpServerConfig {
            name: "test".to_string(),
            command: command.to_string(),
            args: vec![],
            env: None,
            cwd: None,
            protocol_version: None,
            request_timeout_ms: 1_000,
        }
    }

    #[test]
    fn test_json_rpc_request_serialization() {
        let req = JsonRpcRequest {
            jsonrpc: "2.0".to_string(),
            id: Some(json!(1)),
            method: "tools/list".to_string(),
            params: Some(json!({"cursor": "abc"})),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"method\":\"tools/list\""));
        assert!(json.contains("\"id\":1"));
    }

    #[test]
    fn test_mcp_error_codes() {
        assert_eq!(McpError::Timeout.code(), "TIMEOUT");
        assert_eq!(
            McpError::ToolNotFound("test".to_string()).code(),
            "TOOL_NOT_FOUND"
        );
        assert_eq!(
            McpError::InvalidParams("test".to_string()).code(),
            "INVALID_PARAMS"
        );
    }

    #[tokio::test]
    async fn connect_fails_for_missing_binary() {
        let client = McpClient::new(config("nonexistent-command-12345"));
        let err = client.connect().await.unwrap_err();
        assert_eq!(err.code(), "TRANSPORT_ERROR");
        assert!(!client.is_connected());
    }

    #[tokio::test]
    async fn requests_before_connect_fail_fast() {
        let client = McpClient::new(config("unused"));
        let err = client.list_tools().await.unwrap_err();
        assert!(matches!(err, McpError::Transport(_)));
    }
}
