use std::sync::Arc;

use aicalendar_core::telemetry::init_tracing;
use aicalendar_core::{AppConfig, ChatOrchestrator, LlmClient, McpToolRegistry};
use aicalendar_server::{serve, AppState, ServerConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let config = AppConfig::load();
    let server_config = ServerConfig::from_env();

    if config.llm.api_key.is_none() {
        tracing::warn!("No LLM_API_KEY or GITHUB_TOKEN set; completion requests will be unauthenticated");
    }

    let llm = Arc::new(LlmClient::new(config.llm.clone())?);
    let tools = Arc::new(McpToolRegistry::new(config.mcp.clone()));
    let orchestrator = Arc::new(ChatOrchestrator::new(
        llm,
        tools.clone(),
        config.chat.clone(),
    ));

    tracing::info!(
        model = %config.llm.model,
        mcp_command = %config.mcp.command,
        "Starting AI Calendar chat API on {}",
        server_config.addr()
    );

    let state = AppState::new(orchestrator, server_config.require_auth);
    serve(&server_config, state, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    })
    .await?;

    tools.shutdown().await;
    Ok(())
}
