use std::sync::Arc;

use aicalendar_core::telemetry::init_tracing_stderr;
use aicalendar_mcp::{calendar_registry, CalendarApiClient, McpServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    // stdout carries the protocol
    init_tracing_stderr();

    let api = Arc::new(CalendarApiClient::from_env()?);
    let server = McpServer::new(calendar_registry(api.clone()));
    tracing::info!(
        calendar_api = %api.base_url(),
        tools = server.registry().len(),
        "AI Calendar MCP server starting on stdio"
    );

    server.run_stdio().await?;
    Ok(())
}
