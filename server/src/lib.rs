// AI Calendar HTTP API
//
// Exposes the chat orchestrator over REST: POST /api/chat/sendMessage and
// GET /api/health.

pub mod error;

use std::sync::Arc;

use aicalendar_core::ChatOrchestrator;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub use error::ApiError;

/// HTTP listener settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Reject chat requests that carry no bearer token
    pub require_auth: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: std::env::var("SERVER_HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5080),
            require_auth: std::env::var("REQUIRE_AUTH")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(false),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ChatOrchestrator>,
    pub require_auth: bool,
}

impl AppState {
    pub fn new(orchestrator: Arc<ChatOrchestrator>, require_auth: bool) -> Self {
        Self {
            orchestrator,
            require_auth,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    pub response: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Bearer token from the `Authorization` header, if present
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat/sendMessage", post(send_message_handler))
        .route("/api/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Bind and serve until `shutdown` resolves
pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    let addr = config.addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(
        target: "http_api",
        url = %format!("http://{}", addr),
        require_auth = config.require_auth,
        "Chat API ready"
    );
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn send_message_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<Json<SendMessageResponse>, ApiError> {
    let token = bearer_token(&headers);
    if state.require_auth && token.is_none() {
        warn!(target: "http_api", "Rejecting chat request without bearer token");
        return Err(ApiError::Unauthorized);
    }

    let Json(req) = payload?;
    let message = req.message.unwrap_or_default();
    let response = state
        .orchestrator
        .process_message(&message, token.as_deref())
        .await?;
    Ok(Json(SendMessageResponse { response }))
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "Healthy".to_string(),
        timestamp: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(header::AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn bearer_token_is_extracted() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def".into()));
    }

    #[test]
    #[serial_test::serial]
    fn config_from_env() {
        std::env::set_var("SERVER_PORT", "8081");
        std::env::set_var("REQUIRE_AUTH", "true");
        let cfg = ServerConfig::from_env();
        std::env::remove_var("SERVER_PORT");
        std::env::remove_var("REQUIRE_AUTH");

        assert_eq!(cfg.port, 8081);
        assert!(cfg.require_auth);
        assert!(cfg.addr().ends_with(":8081"));
    }

    #[test]
    fn non_bearer_or_missing_is_absent() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwYXNz")), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
    }
}
