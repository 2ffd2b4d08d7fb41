//! Client for the Calendar REST API the tools act on.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

#[derive(Debug, Error)]
pub enum CalendarApiError {
    #[error("Calendar API returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("Calendar API request failed: {0}")]
    Transport(String),

    #[error("Invalid Calendar API response: {0}")]
    Decode(String),
}

/// Parse the date-time shapes the API and the model produce: RFC 3339 with
/// offset (offset dropped), naive `YYYY-MM-DDTHH:MM[:SS[.f]]`, a space
/// separated variant, or a bare date (midnight).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

mod api_datetime {
    use chrono::NaiveDateTime;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&dt.format("%Y-%m-%dT%H:%M:%S").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        super::parse_datetime(&raw).ok_or_else(|| D::Error::custom(format!("invalid date-time: {raw}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attendee {
    #[serde(default, alias = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organizer {
    #[serde(default, alias = "Name", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, alias = "Email", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Calendar event as exchanged with the API (camelCase; PascalCase accepted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    #[serde(default, alias = "Id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, alias = "Title")]
    pub title: String,
    #[serde(alias = "Start", with = "api_datetime")]
    pub start: NaiveDateTime,
    #[serde(alias = "End", with = "api_datetime")]
    pub end: NaiveDateTime,
    #[serde(default, alias = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, alias = "Location", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, alias = "Attendees", skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
    #[serde(default, alias = "Organizer", skip_serializing_if = "Option::is_none")]
    pub organizer: Option<Organizer>,
}

impl CalendarEvent {
    pub fn new(title: impl Into<String>, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            id: None,
            title: title.into(),
            start,
            end,
            description: None,
            location: None,
            attendees: None,
            organizer: None,
        }
    }
}

#[derive(Clone)]
pub struct CalendarApiClient {
    http: Client,
    base_url: String,
}

impl CalendarApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, CalendarApiError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CalendarApiError::Transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `CALENDAR_API_BASE_URL` (default `http://localhost:5000`), `CALENDAR_API_TIMEOUT_MS`
    pub fn from_env() -> Result<Self, CalendarApiError> {
        let base_url = std::env::var("CALENDAR_API_BASE_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "http://localhost:5000".to_string());
        let timeout_ms = std::env::var("CALENDAR_API_TIMEOUT_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30_000);
        Self::new(base_url, Duration::from_millis(timeout_ms))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(req: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        match access_token.filter(|t| !t.is_empty()) {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    /// `GET /api/CalendarEvent?start&end`
    pub async fn list_events(
        &self,
        start: Option<&str>,
        end: Option<&str>,
        access_token: Option<&str>,
    ) -> Result<Vec<CalendarEvent>, CalendarApiError> {
        let url = format!("{}/api/CalendarEvent", self.base_url);
        let query: Vec<(&str, &str)> = [("start", start), ("end", end)]
            .into_iter()
            .filter_map(|(k, v)| v.filter(|s| !s.is_empty()).map(|v| (k, v)))
            .collect();
        debug!(target: "calendar_api", url = %url, ?query, "GET calendar events");

        let req = Self::authorized(self.http.get(&url).query(&query), access_token);
        let text = Self::send(req).await?;
        if text.trim().is_empty() || text.trim() == "null" {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).map_err(|e| CalendarApiError::Decode(e.to_string()))
    }

    /// `POST /api/CalendarEvent/create`
    pub async fn create_event(
        &self,
        event: &CalendarEvent,
        access_token: Option<&str>,
    ) -> Result<CalendarEvent, CalendarApiError> {
        let url = format!("{}/api/CalendarEvent/create", self.base_url);
        debug!(target: "calendar_api", url = %url, title = %event.title, "POST calendar event");

        let req = Self::authorized(self.http.post(&url).json(event), access_token);
        let text = Self::send(req).await?;
        serde_json::from_str(&text).map_err(|e| CalendarApiError::Decode(e.to_string()))
    }

    async fn send(req: RequestBuilder) -> Result<String, CalendarApiError> {
        let resp = req
            .send()
            .await
            .map_err(|e| CalendarApiError::Transport(e.to_string()))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| CalendarApiError::Transport(e.to_string()))?;
        if !status.is_success() {
            error!(target: "calendar_api", %status, body = %body, "Calendar API error");
            return Err(CalendarApiError::Status { status, body });
        }
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_api_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2025, 6, 16)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap();
        assert_eq!(parse_datetime("2025-06-16T10:00:00"), Some(expected));
        assert_eq!(parse_datetime("2025-06-16T10:00:00.0000000"), Some(expected));
        assert_eq!(parse_datetime("2025-06-16T10:00:00+02:00"), Some(expected));
        assert_eq!(parse_datetime("2025-06-16T10:00"), Some(expected));
        assert_eq!(parse_datetime("2025-06-16 10:00"), Some(expected));
        assert_eq!(
            parse_datetime("2025-06-16"),
            NaiveDate::from_ymd_opt(2025, 6, 16).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(parse_datetime("next tuesday"), None);
    }

    #[test]
    fn event_accepts_pascal_case() {
        let ev: CalendarEvent = serde_json::from_str(
            r#"{"Id":"1","Title":"Standup","Start":"2025-06-16T09:00:00","End":"2025-06-16T09:15:00","Description":null,"Attendees":[{"Name":"Ana","Email":"ana@example.com","ResponseStatus":3}]}"#,
        )
        .unwrap();
        assert_eq!(ev.title, "Standup");
        assert_eq!(ev.id.as_deref(), Some("1"));
        assert_eq!(ev.attendees.unwrap()[0].name.as_deref(), Some("Ana"));
    }

    #[test]
    fn event_serializes_camel_case() {
        let start = parse_datetime("2025-06-19T14:00:00").unwrap();
        let end = parse_datetime("2025-06-19T15:00:00").unwrap();
        let v = serde_json::to_value(CalendarEvent::new("Dentist", start, end)).unwrap();
        assert_eq!(v["title"], "Dentist");
        assert_eq!(v["start"], "2025-06-19T14:00:00");
        assert!(v.get("id").is_none());
    }
}
