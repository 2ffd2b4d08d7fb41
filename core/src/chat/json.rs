//! Helpers for reading JSON objects out of model completions.

use serde_json::{Map, Value};

/// Strip markdown code fences and a leading language tag around a JSON body.
///
/// ```
/// use aicalendar_core::chat::json::strip_code_fences;
/// assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
/// ```
pub fn strip_code_fences(raw: &str) -> &str {
    let mut s = raw.trim();

    if let Some(rest) = s.strip_prefix("```") {
        s = match rest.find('\n') {
            Some(i) => &rest[i + 1..],
            None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
        };
        s = s.trim_end();
        if let Some(body) = s.strip_suffix("```") {
            s = body;
        }
        s = s.trim();
    }

    // Bare tag without fences, e.g. "json\n{...}"
    for tag in ["json", "JSON"] {
        if let Some(rest) = s.strip_prefix(tag) {
            let rest = rest.trim_start();
            if rest.starts_with('{') {
                return rest;
            }
        }
    }

    s
}

/// Parse a completion as a flat JSON object.
///
/// Falls back to the outermost `{...}` span when the model wrapped the object
/// in prose.
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>, serde_json::Error> {
    let body = strip_code_fences(raw);
    match serde_json::from_str::<Map<String, Value>>(body) {
        Ok(map) => Ok(map),
        Err(e) => match (body.find('{'), body.rfind('}')) {
            (Some(start), Some(end)) if start < end => {
                serde_json::from_str::<Map<String, Value>>(&body[start..=end]).map_err(|_| e)
            }
            _ => Err(e),
        },
    }
}

/// Lowercase the top-level keys of an object
pub fn lowercase_keys(map: Map<String, Value>) -> Map<String, Value> {
    map.into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strips_fenced_json() {
        let raw = "```json\n{\"intent\":\"GREETING\"}\n```";
        assert_eq!(strip_code_fences(raw), "{\"intent\":\"GREETING\"}");
    }

    #[test]
    fn strips_fence_without_tag() {
        let raw = "```\n{\"a\":1}\n```\n";
        assert_eq!(strip_code_fences(raw), "{\"a\":1}");
    }

    #[test]
    fn strips_single_line_fence() {
        assert_eq!(strip_code_fences("```json {\"a\":1}```"), "{\"a\":1}");
    }

    #[test]
    fn strips_bare_language_tag() {
        assert_eq!(strip_code_fences("json\n{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn leaves_plain_json_alone() {
        assert_eq!(strip_code_fences("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn parses_object_wrapped_in_prose() {
        let raw = "Sure! Here is the result: {\"start\": \"2025-06-01T09:00:00\"} Hope it helps.";
        let map = parse_json_object(raw).unwrap();
        assert_eq!(map.get("start"), Some(&json!("2025-06-01T09:00:00")));
    }

    #[test]
    fn rejects_non_object() {
        assert!(parse_json_object("[1, 2, 3]").is_err());
        assert!(parse_json_object("not json at all").is_err());
    }

    #[test]
    fn lowercases_top_level_keys_only() {
        let map = json!({"ToolToCall": "x", "Entities": {"Date": "today"}})
            .as_object()
            .cloned()
            .unwrap();
        let lowered = lowercase_keys(map);
        assert_eq!(lowered["tooltocall"], "x");
        assert_eq!(lowered["entities"]["Date"], "today");
    }
}
