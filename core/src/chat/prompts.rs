//! Prompt builders for the three completion round-trips.

use super::intention::Intent;
use crate::tools::ToolDescriptor;
use chrono::{DateTime, Datelike, Duration, Local, NaiveDate};
use std::fmt::Write as _;

/// Intent descriptions shown to the classifier
fn intent_hint(intent: Intent) -> &'static str {
    match intent {
        Intent::CreateEvent => "the user wants to add a new event or meeting",
        Intent::UpdateEvent => "the user wants to change an existing event",
        Intent::DeleteEvent => "the user wants to remove or cancel an event",
        Intent::ViewEvents => "the user wants to see events for a day or period",
        Intent::SearchEvents => "the user is looking for specific events",
        Intent::SetReminder => "the user wants to be reminded about something",
        Intent::GeneralQuestion => "a question not tied to a calendar action",
        Intent::Greeting => "hello, thanks, small talk",
        Intent::Other => "anything else",
    }
}

/// System prompt for intent classification and tool selection
pub fn intention_prompt(tools: &[ToolDescriptor]) -> String {
    let mut p = String::from(
        "You are an AI calendar assistant. Classify the user's message and decide whether \
         one of the available tools should be called to fulfil it.\n\nPossible intents:\n",
    );
    for intent in Intent::ALL {
        let _ = writeln!(p, "- {}: {}", intent.as_str(), intent_hint(intent));
    }

    p.push_str("\nAvailable tools:\n");
    if tools.is_empty() {
        p.push_str("- (none)\n");
    }
    for tool in tools {
        let _ = writeln!(p, "- {}: {}", tool.name, tool.description);
    }

    p.push_str(
        "\nRespond with ONLY a single JSON object. No markdown, no code fences, no text \
         before or after it. Use exactly these fields:\n\
         {\n\
         \x20 \"intent\": \"<one of the intents above>\",\n\
         \x20 \"confidence\": \"high\" | \"medium\" | \"low\",\n\
         \x20 \"entities\": { \"<name>\": \"<value taken from the message>\" },\n\
         \x20 \"response\": \"<short friendly reply shown to the user if no tool is called>\",\n\
         \x20 \"toolToCall\": \"<exact tool name from the list above, or an empty string>\"\n\
         }\n\n\
         Rules:\n\
         - \"toolToCall\" MUST be copied character for character from the available tool \
         names, with the same case, or be \"\" when no tool applies.\n\
         - Never invent a tool name that is not listed.\n\
         - Greetings and general questions use \"toolToCall\": \"\".\n",
    );
    p
}

/// Concrete dates for the relative phrases users tend to use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeDates {
    pub today: NaiveDate,
    pub tomorrow: NaiveDate,
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub month_start: NaiveDate,
    pub month_end: NaiveDate,
    pub next_month_start: NaiveDate,
    pub next_month_end: NaiveDate,
}

fn first_of_next_month(d: NaiveDate) -> NaiveDate {
    let (year, month) = if d.month() == 12 {
        (d.year() + 1, 1)
    } else {
        (d.year(), d.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(d)
}

impl RelativeDates {
    pub fn from_today(today: NaiveDate) -> Self {
        let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
        let month_start = today.with_day(1).unwrap_or(today);
        let next_month_start = first_of_next_month(today);
        let next_month_end = first_of_next_month(next_month_start)
            .pred_opt()
            .unwrap_or(next_month_start);
        Self {
            today,
            tomorrow: today.succ_opt().unwrap_or(today),
            week_start,
            week_end: week_start + Duration::days(6),
            month_start,
            month_end: next_month_start.pred_opt().unwrap_or(today),
            next_month_start,
            next_month_end,
        }
    }
}

/// System prompt for extracting tool arguments from the user's message
pub fn argument_prompt(tool: &ToolDescriptor, now: DateTime<Local>, reserved_key: &str) -> String {
    let d = RelativeDates::from_today(now.date_naive());
    let schema = serde_json::to_string_pretty(&tool.input_schema)
        .unwrap_or_else(|_| tool.input_schema.to_string());

    let mut p = String::new();
    let _ = writeln!(p, "You extract arguments for the tool \"{}\".", tool.name);
    let _ = writeln!(p, "Tool description: {}", tool.description);
    let _ = writeln!(p, "Input schema:\n{}\n", schema);
    let _ = writeln!(
        p,
        "Current date and time: {} ({})\n",
        now.format("%Y-%m-%dT%H:%M:%S"),
        now.format("%A")
    );
    p.push_str("Resolve relative dates against the current date:\n");
    let _ = writeln!(p, "- \"today\": {}", d.today);
    let _ = writeln!(p, "- \"tomorrow\": {}", d.tomorrow);
    let _ = writeln!(
        p,
        "- \"this week\": {}T00:00:00 to {}T23:59:59",
        d.week_start, d.week_end
    );
    let _ = writeln!(
        p,
        "- \"this month\": {}T00:00:00 to {}T23:59:59",
        d.month_start, d.month_end
    );
    let _ = writeln!(
        p,
        "- \"next month\": {}T00:00:00 to {}T23:59:59",
        d.next_month_start, d.next_month_end
    );
    p.push_str(
        "- \"morning\" means 09:00:00, \"afternoon\" 14:00:00, \"evening\" 18:00:00 \
         unless a time is given\n\n",
    );
    p.push_str(
        "Rules:\n\
         1. Argument names must match the schema's property names EXACTLY, including case.\n\
         2. Every value must have the type the schema declares for it.\n\
         3. A required property that cannot be determined from the message is set to null.\n\
         4. Optional properties the message does not mention are omitted.\n\
         5. Dates and times use ISO 8601 in the form YYYY-MM-DDTHH:MM:SS.\n",
    );
    let _ = writeln!(
        p,
        "6. Never include \"{}\"; it is supplied separately.\n",
        reserved_key
    );
    p.push_str(
        "Respond with ONLY a flat JSON object of arguments. No markdown, no code fences, \
         no explanations.",
    );
    p
}

/// System prompt for phrasing the final reply
pub const DRAFT_SYSTEM_PROMPT: &str = "You are a friendly calendar assistant. Write the reply \
the user will read, based on what they asked for and the result of the action taken for them.\n\
Guidelines:\n\
- Be warm, concise and conversational. No technical jargon, JSON, field names or error codes.\n\
- Refer back to what the user asked for.\n\
- List events in a readable way: title, day and time.\n\
Example phrasings (guidance only, adapt them freely):\n\
- Success: \"You have 3 events this week: a team sync on Monday at 10:00, ...\"\n\
- Nothing found: \"Good news, your calendar is clear for that period.\"\n\
- Error: \"I couldn't reach your calendar just now. Please try again in a moment.\"";

/// User turn for the drafting round-trip
pub fn draft_prompt(tool_result: &str, original_message: &str) -> String {
    format!(
        "User request: {}\n\nAction result:\n{}",
        original_message.trim(),
        tool_result.trim()
    )
}
