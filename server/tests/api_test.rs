use std::sync::{Arc, Mutex};

use aicalendar_core::{
    ChatMessage, ChatOrchestrator, CompletionClient, OrchestratorOptions, Result, ToolArguments,
    ToolCallResult, ToolDescriptor, ToolRegistry, ToolResult,
};
use aicalendar_server::{router, AppState, HealthResponse};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Always classifies as a greeting
struct GreetingLlm {
    calls: Mutex<usize>,
}

#[async_trait]
impl CompletionClient for GreetingLlm {
    async fn complete(&self, _messages: &[ChatMessage]) -> Result<String> {
        *self.calls.lock().unwrap() += 1;
        Ok(r#"{"intent":"GREETING","confidence":"high","entities":{},"response":"Hi there!","toolToCall":""}"#.into())
    }
}

struct NoTools;

#[async_trait]
impl ToolRegistry for NoTools {
    async fn list_tools(&self) -> ToolResult<Vec<ToolDescriptor>> {
        Ok(vec![])
    }

    async fn call_tool(&self, _name: &str, _arguments: ToolArguments) -> ToolResult<ToolCallResult> {
        Ok(ToolCallResult::text("unused"))
    }
}

fn app(require_auth: bool) -> (axum::Router, Arc<GreetingLlm>) {
    let llm = Arc::new(GreetingLlm {
        calls: Mutex::new(0),
    });
    let orchestrator = ChatOrchestrator::new(
        llm.clone(),
        Arc::new(NoTools),
        OrchestratorOptions {
            llm_timeout_ms: 1_000,
            tool_timeout_ms: 1_000,
        },
    );
    (
        router(AppState::new(Arc::new(orchestrator), require_auth)),
        llm,
    )
}

fn chat_request(body: Value, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/chat/sendMessage")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = auth {
        builder = builder.header(header::AUTHORIZATION, auth);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn json_body(resp: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_send_message_returns_reply() {
    let (app, llm) = app(false);
    let resp = app
        .oneshot(chat_request(json!({"message": "hello"}), None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"response": "Hi there!"}));
    assert_eq!(*llm.calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_empty_message_is_bad_request() {
    let (app, llm) = app(false);
    let resp = app
        .oneshot(chat_request(json!({"message": "   "}), None))
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(resp).await,
        json!({"error": "Message cannot be empty."})
    );
    assert_eq!(*llm.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_missing_message_field_is_bad_request() {
    let (app, _) = app(false);
    let resp = app.oneshot(chat_request(json!({}), None)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_body_is_json_bad_request() {
    let (app, llm) = app(false);
    let resp = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat/sendMessage")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{\"message\": "))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());

    let resp = app
        .clone()
        .oneshot(chat_request(json!({"message": 42}), None))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());

    let resp = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/chat/sendMessage")
                .header(header::CONTENT_TYPE, "text/plain")
                .body(Body::from("hello"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(json_body(resp).await["error"].is_string());
    assert_eq!(*llm.calls.lock().unwrap(), 0);
}

#[tokio::test]
async fn test_require_auth_rejects_missing_token() {
    let (app, llm) = app(true);
    let resp = app
        .clone()
        .oneshot(chat_request(json!({"message": "hello"}), Some("Basic abc")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(*llm.calls.lock().unwrap(), 0);

    let resp = app
        .oneshot(chat_request(json!({"message": "hello"}), Some("Bearer tok-1")))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health() {
    let (app, _) = app(false);
    let resp = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let health: HealthResponse = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(health.status, "Healthy");
}
