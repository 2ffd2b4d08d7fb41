use super::json::{lowercase_keys, parse_json_object};
use crate::tools::ToolDescriptor;
use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Response used when the intent of a message could not be determined
pub const INTENT_FALLBACK_RESPONSE: &str =
    "I'm sorry, I had trouble understanding your request. Could you please rephrase it?";

/// Fixed set of intents a message is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Intent {
    CreateEvent,
    UpdateEvent,
    DeleteEvent,
    ViewEvents,
    SearchEvents,
    SetReminder,
    GeneralQuestion,
    Greeting,
    #[default]
    Other,
}

impl Intent {
    pub const ALL: [Intent; 9] = [
        Intent::CreateEvent,
        Intent::UpdateEvent,
        Intent::DeleteEvent,
        Intent::ViewEvents,
        Intent::SearchEvents,
        Intent::SetReminder,
        Intent::GeneralQuestion,
        Intent::Greeting,
        Intent::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::CreateEvent => "CREATE_EVENT",
            Intent::UpdateEvent => "UPDATE_EVENT",
            Intent::DeleteEvent => "DELETE_EVENT",
            Intent::ViewEvents => "VIEW_EVENTS",
            Intent::SearchEvents => "SEARCH_EVENTS",
            Intent::SetReminder => "SET_REMINDER",
            Intent::GeneralQuestion => "GENERAL_QUESTION",
            Intent::Greeting => "GREETING",
            Intent::Other => "OTHER",
        }
    }

    /// Lenient parse: case, spaces and hyphens are ignored; unknown values are `Other`
    pub fn parse(s: &str) -> Self {
        let normalized = s.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        Intent::ALL
            .into_iter()
            .find(|i| i.as_str() == normalized)
            .unwrap_or(Intent::Other)
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    #[default]
    Low,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::High => "high",
            Confidence::Medium => "medium",
            Confidence::Low => "low",
        }
    }

    /// Unknown values read as `Low`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "high" => Confidence::High,
            "medium" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }
}

/// The orchestrator's classification of one user message
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIntention {
    pub intent: Intent,
    pub confidence: Confidence,
    pub entities: Map<String, Value>,
    pub response: String,
    pub tool_to_call: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_tool: Option<ToolDescriptor>,
}

/// Outcome of matching `toolToCall` against the live tool list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolResolution {
    NotRequested,
    Resolved(String),
    Unknown(String),
}

/// Wire shape of the classification object, keys already lowercased
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawIntention {
    intent: Option<String>,
    confidence: Option<String>,
    entities: Option<Value>,
    response: Option<String>,
    #[serde(rename = "tooltocall", alias = "tool_to_call")]
    tool_to_call: Option<String>,
}

impl UserIntention {
    /// Best-effort intention used when classification fails
    pub fn fallback() -> Self {
        Self {
            intent: Intent::Other,
            confidence: Confidence::Low,
            entities: Map::new(),
            response: INTENT_FALLBACK_RESPONSE.to_string(),
            tool_to_call: String::new(),
            resolved_tool: None,
        }
    }

    /// Parse a model completion; field names are matched case-insensitively.
    pub fn from_model_output(raw: &str) -> Result<Self> {
        let map = lowercase_keys(parse_json_object(raw)?);
        let parsed: RawIntention = serde_json::from_value(Value::Object(map))?;

        let entities = match parsed.entities {
            Some(Value::Object(m)) => m,
            _ => Map::new(),
        };

        Ok(Self {
            intent: parsed.intent.as_deref().map(Intent::parse).unwrap_or_default(),
            confidence: parsed
                .confidence
                .as_deref()
                .map(Confidence::parse)
                .unwrap_or_default(),
            entities,
            response: parsed.response.unwrap_or_default(),
            tool_to_call: parsed.tool_to_call.unwrap_or_default().trim().to_string(),
            resolved_tool: None,
        })
    }

    /// Attach the tool named by `toolToCall` and adopt its listed spelling,
    /// or clear the name when no listed tool matches it.
    pub fn resolve_tool(&mut self, tools: &[ToolDescriptor]) -> ToolResolution {
        if self.tool_to_call.is_empty() {
            self.resolved_tool = None;
            return ToolResolution::NotRequested;
        }

        match tools.iter().find(|t| t.matches_name(&self.tool_to_call)) {
            Some(tool) => {
                self.tool_to_call = tool.name.clone();
                self.resolved_tool = Some(tool.clone());
                ToolResolution::Resolved(tool.name.clone())
            }
            None => {
                let requested = std::mem::take(&mut self.tool_to_call);
                self.resolved_tool = None;
                ToolResolution::Unknown(requested)
            }
        }
    }

    pub fn has_resolved_tool(&self) -> bool {
        self.resolved_tool.is_some()
    }
}
