// AI Calendar MCP tool server
//
// Serves calendar tools over stdio JSON-RPC. Each tool forwards to the
// Calendar REST API with the caller's access token.

pub mod calendar_api;
pub mod server;
pub mod tools;

use std::sync::Arc;

use aicalendar_core::LocalToolRegistry;

pub use calendar_api::{CalendarApiClient, CalendarApiError, CalendarEvent};
pub use server::McpServer;
pub use tools::{format_events, CreateCalendarEventTool, GetCalendarEventsTool};

/// Registry holding every calendar tool, all backed by `api`
pub fn calendar_registry(api: Arc<CalendarApiClient>) -> LocalToolRegistry {
    let registry = LocalToolRegistry::new();
    registry.register(Arc::new(GetCalendarEventsTool::new(api.clone())));
    registry.register(Arc::new(CreateCalendarEventTool::new(api)));
    registry
}
