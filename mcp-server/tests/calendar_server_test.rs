use std::sync::Arc;
use std::time::Duration;

use aicalendar_mcp::{calendar_registry, CalendarApiClient, McpServer};
use serde_json::{json, Value};

fn server() -> McpServer {
    // Nothing listens on the discard port
    let api = CalendarApiClient::new("http://127.0.0.1:9", Duration::from_millis(500)).unwrap();
    McpServer::new(calendar_registry(Arc::new(api)))
}

async fn request(server: &McpServer, msg: Value) -> Value {
    let out = server.handle_line(&msg.to_string()).await.unwrap();
    serde_json::from_str(&out).unwrap()
}

#[tokio::test]
async fn test_lists_calendar_tools() {
    let s = server();
    let v = request(&s, json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"})).await;
    let names: Vec<&str> = v["result"]["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["create_calendar_event", "get_calendar_events"]);
    assert!(v["result"].get("nextCursor").is_none());
}

#[tokio::test]
async fn test_unreachable_calendar_api_is_reported_in_result() {
    let s = server();
    let v = request(
        &s,
        json!({"jsonrpc": "2.0", "id": 2, "method": "tools/call", "params": {
            "name": "get_calendar_events",
            "arguments": {"start": "2025-06-16T00:00:00", "accessToken": "tok-123"}
        }}),
    )
    .await;
    assert_eq!(v["result"]["isError"], true);
    let text = v["result"]["content"][0]["text"].as_str().unwrap();
    let body: Value = serde_json::from_str(text).unwrap();
    assert_eq!(body["error"], "Error trying to retrieve calendar events");
}

#[tokio::test]
async fn test_create_with_null_title_reports_reason_in_result() {
    let s = server();
    let v = request(
        &s,
        json!({"jsonrpc": "2.0", "id": 3, "method": "tools/call", "params": {
            "name": "create_calendar_event",
            "arguments": {"title": null, "start": "2025-06-19T14:00:00", "end": "2025-06-19T15:00:00"}
        }}),
    )
    .await;
    assert!(v.get("error").is_none());
    assert_eq!(v["result"]["isError"], true);
    let text = v["result"]["content"][0]["text"].as_str().unwrap();
    let body: Value = serde_json::from_str(text).unwrap();
    assert_eq!(body["error"], "Invalid arguments");
    assert_eq!(body["message"], "title is required");
}

#[tokio::test]
async fn test_unknown_tool_is_invalid_params() {
    let s = server();
    let v = request(
        &s,
        json!({"jsonrpc": "2.0", "id": 4, "method": "tools/call", "params": {
            "name": "delete_everything",
            "arguments": {}
        }}),
    )
    .await;
    assert_eq!(v["error"]["code"], -32602);
}
