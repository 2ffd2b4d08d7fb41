//! Calendar tools served over MCP.

use std::sync::Arc;

use aicalendar_core::{Tool, ToolArguments, ToolError, ToolResult};
use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info};

use crate::calendar_api::{parse_datetime, CalendarApiClient, CalendarApiError, CalendarEvent};

/// Argument carrying the caller's bearer token
pub const ACCESS_TOKEN_ARGUMENT: &str = "accessToken";

pub const NO_EVENTS_FOUND: &str = "No calendar events found for the specified period.";

const DISPLAY_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Serialize)]
struct EventSummary<'a> {
    title: &'a str,
    start: String,
    end: String,
    description: Option<&'a str>,
}

impl<'a> From<&'a CalendarEvent> for EventSummary<'a> {
    fn from(e: &'a CalendarEvent) -> Self {
        Self {
            title: &e.title,
            start: e.start.format(DISPLAY_FORMAT).to_string(),
            end: e.end.format(DISPLAY_FORMAT).to_string(),
            description: e.description.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct EventListing<'a> {
    count: usize,
    events: Vec<EventSummary<'a>>,
}

/// Render events for the model: a fixed sentence when empty, otherwise
/// pretty JSON `{count, events: [{title, start, end, description}]}`.
pub fn format_events(events: &[CalendarEvent]) -> String {
    if events.is_empty() {
        return NO_EVENTS_FOUND.to_string();
    }
    let listing = EventListing {
        count: events.len(),
        events: events.iter().map(EventSummary::from).collect(),
    };
    serde_json::to_string_pretty(&listing).unwrap_or_else(|e| {
        json!({"error": "Error formatting calendar events", "message": e.to_string()}).to_string()
    })
}

/// JSON error text returned to the model when the API call fails
fn api_failure(action: &str, e: &CalendarApiError) -> ToolError {
    let body = match e {
        CalendarApiError::Status { status, body } => json!({
            "error": format!("Failed to {action}"),
            "statusCode": status.as_u16(),
            "details": body,
        }),
        other => json!({
            "error": format!("Error trying to {action}"),
            "message": other.to_string(),
        }),
    };
    ToolError::ExecutionFailed(body.to_string())
}

fn optional_str<'a>(arguments: &'a ToolArguments, key: &str) -> Option<&'a str> {
    arguments
        .get_str(key)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn required_datetime(arguments: &ToolArguments, key: &str) -> ToolResult<NaiveDateTime> {
    let raw = optional_str(arguments, key)
        .ok_or_else(|| ToolError::InvalidArguments(format!("{key} is required")))?;
    parse_datetime(raw).ok_or_else(|| {
        ToolError::InvalidArguments(format!("{key} must be an ISO 8601 date-time, got {raw:?}"))
    })
}

fn access_token_schema() -> Value {
    json!({"type": "string", "description": "Access token for authentication"})
}

pub struct GetCalendarEventsTool {
    api: Arc<CalendarApiClient>,
}

impl GetCalendarEventsTool {
    pub fn new(api: Arc<CalendarApiClient>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Tool for GetCalendarEventsTool {
    fn name(&self) -> String {
        "get_calendar_events".into()
    }

    fn description(&self) -> String {
        "Retrieve calendar events for a period via the Calendar API".into()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "start": {
                    "type": "string",
                    "description": "Start date for filtering events (optional, ISO 8601 format)"
                },
                "end": {
                    "type": "string",
                    "description": "End date for filtering events (optional, ISO 8601 format)"
                },
                "accessToken": access_token_schema()
            }
        })
    }

    async fn call(&self, arguments: ToolArguments) -> ToolResult<String> {
        let start = optional_str(&arguments, "start");
        let end = optional_str(&arguments, "end");
        info!(target: "calendar_tools", ?start, ?end, "Getting calendar events");

        let events = self
            .api
            .list_events(start, end, optional_str(&arguments, ACCESS_TOKEN_ARGUMENT))
            .await
            .map_err(|e| {
                error!(target: "calendar_tools", error = %e, "Failed to get calendar events");
                api_failure("retrieve calendar events", &e)
            })?;
        Ok(format_events(&events))
    }
}

pub struct CreateCalendarEventTool {
    api: Arc<CalendarApiClient>,
}

impl CreateCalendarEventTool {
    pub fn new(api: Arc<CalendarApiClient>) -> Self {
        Self { api }
    }

    /// Validate arguments into the event to create
    pub fn event_from_arguments(arguments: &ToolArguments) -> ToolResult<CalendarEvent> {
        let title = optional_str(arguments, "title")
            .ok_or_else(|| ToolError::InvalidArguments("title is required".into()))?;
        let start = required_datetime(arguments, "start")?;
        let end = required_datetime(arguments, "end")?;
        if end < start {
            return Err(ToolError::InvalidArguments(
                "end must not be before start".into(),
            ));
        }

        let mut event = CalendarEvent::new(title, start, end);
        event.description = optional_str(arguments, "description").map(str::to_string);
        event.location = optional_str(arguments, "location").map(str::to_string);
        Ok(event)
    }
}

#[async_trait]
impl Tool for CreateCalendarEventTool {
    fn name(&self) -> String {
        "create_calendar_event".into()
    }

    fn description(&self) -> String {
        "Create a new calendar event via the Calendar API".into()
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "title": {"type": "string", "description": "Event title"},
                "start": {"type": "string", "description": "Start date and time (ISO 8601 format)"},
                "end": {"type": "string", "description": "End date and time (ISO 8601 format)"},
                "description": {"type": "string", "description": "Event description (optional)"},
                "location": {"type": "string", "description": "Event location (optional)"},
                "accessToken": access_token_schema()
            },
            "required": ["title", "start", "end"]
        })
    }

    async fn call(&self, arguments: ToolArguments) -> ToolResult<String> {
        let event = Self::event_from_arguments(&arguments)?;
        info!(target: "calendar_tools", title = %event.title, start = %event.start, "Creating calendar event");

        let created = self
            .api
            .create_event(&event, optional_str(&arguments, ACCESS_TOKEN_ARGUMENT))
            .await
            .map_err(|e| {
                error!(target: "calendar_tools", error = %e, "Failed to create calendar event");
                api_failure("create calendar event", &e)
            })?;

        let body = json!({
            "status": "created",
            "event": EventSummary::from(&created),
        });
        Ok(serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string()))
    }
}
