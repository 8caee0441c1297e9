//! Boundary between untrusted model text and structured data
//!
//! Models are told to answer with a bare JSON object, but responses regularly
//! arrive wrapped in code fences or surrounded by chatter. Everything that
//! leaves this module is either a JSON object or a [`ParseError`].

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Decoded model output
pub type JsonObject = Map<String, Value>;

/// Maximum characters of raw output kept in an error for diagnostics
const EXCERPT_LEN: usize = 200;

/// The model's output could not be decoded into a single object
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message} | Raw: {excerpt}")]
pub struct ParseError {
    pub message: String,
    pub excerpt: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>, raw: &str) -> Self {
        Self {
            message: message.into(),
            excerpt: excerpt(raw),
        }
    }
}

fn excerpt(raw: &str) -> String {
    if raw.chars().count() > EXCERPT_LEN {
        let cut: String = raw.chars().take(EXCERPT_LEN).collect();
        format!("{}...", cut)
    } else {
        raw.to_string()
    }
}

fn fence_regex() -> &'static Regex {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    // Opening fences may carry a language tag (```json, ```JSON5, ``` js)
    FENCE.get_or_init(|| Regex::new(r"```[ \t]*[A-Za-z0-9_+\-]*").expect("valid fence regex"))
}

/// Remove every code fence marker, including an optional language tag
pub fn strip_code_fences(raw: &str) -> String {
    fence_regex().replace_all(raw, "").trim().to_string()
}

/// Decode raw completion text into a JSON object
///
/// Empty or whitespace-only text decodes to an empty object so that callers
/// can treat every field as "not extracted".
pub fn normalize(raw: &str) -> Result<JsonObject, ParseError> {
    let text = strip_code_fences(raw);
    if text.is_empty() {
        return Ok(JsonObject::new());
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(Value::Object(obj)) => return Ok(obj),
        Ok(other) => {
            return Err(ParseError::new(
                format!("Expected a JSON object, got {}", value_kind(&other)),
                raw,
            ))
        }
        Err(_) => {}
    }

    // Fall back to the outermost braces when the object is surrounded by prose
    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(s), Some(e)) if s < e => match serde_json::from_str::<Value>(&text[s..=e]) {
            Ok(Value::Object(obj)) => Ok(obj),
            Ok(other) => Err(ParseError::new(
                format!("Expected a JSON object, got {}", value_kind(&other)),
                raw,
            )),
            Err(e) => Err(ParseError::new(format!("Invalid JSON from AI: {}", e), raw)),
        },
        _ => Err(ParseError::new("No JSON object found in AI response", raw)),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Look up a field by name, ignoring key case ("Price" and "price" both match)
fn lookup<'a>(obj: &'a JsonObject, key: &str) -> Option<&'a Value> {
    obj.get(key).or_else(|| {
        obj.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })
}

/// A non-empty string field; null, blank and non-string values are "absent"
pub fn string_field(obj: &JsonObject, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match lookup(obj, key) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    })
}

/// A finite numeric field
///
/// Accepts JSON numbers and numeric strings with thousands separators ("1,200").
pub fn number_field(obj: &JsonObject, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match lookup(obj, key) {
        Some(Value::Number(n)) => n.as_f64().filter(|v| v.is_finite()),
        Some(Value::String(s)) => {
            let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
            cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_plain_object() {
        let obj = normalize(r#"{"title": "Lunch", "amount": 15, "type": "expense"}"#).unwrap();
        assert_eq!(obj["title"], "Lunch");
        assert_eq!(obj["amount"], 15);
    }

    #[test]
    fn test_normalize_fenced_matches_unfenced() {
        let bare = r#"{"title":"Taxi","amount":500,"type":"expense"}"#;
        let fenced = format!("```json\n{}\n```", bare);
        let untagged = format!("```\n{}\n```", bare);
        let expected = normalize(bare).unwrap();
        assert_eq!(normalize(&fenced).unwrap(), expected);
        assert_eq!(normalize(&untagged).unwrap(), expected);
    }

    #[test]
    fn test_normalize_prose_before_fence() {
        let raw = "Sure! ```json\n{\"title\":\"Taxi\",\"amount\":500,\"type\":\"expense\"}\n```";
        let obj = normalize(raw).unwrap();
        assert_eq!(
            Value::Object(obj),
            json!({"title": "Taxi", "amount": 500, "type": "expense"})
        );
    }

    #[test]
    fn test_normalize_empty_is_empty_object() {
        assert!(normalize("").unwrap().is_empty());
        assert!(normalize("   \n\t ").unwrap().is_empty());
        assert!(normalize("```json\n```").unwrap().is_empty());
    }

    #[test]
    fn test_normalize_malformed_returns_error() {
        for raw in [
            "I could not read the receipt.",
            "{\"title\": \"Lunch\", \"amount\": }",
            "{ not json at all }",
            "[1, 2, 3]",
            "42",
            "null",
        ] {
            let result = normalize(raw);
            assert!(result.is_err(), "expected error for {:?}", raw);
        }
    }

    #[test]
    fn test_parse_error_truncates_excerpt() {
        let raw = "x".repeat(500);
        let err = normalize(&raw).unwrap_err();
        assert!(err.excerpt.ends_with("..."));
        assert_eq!(err.excerpt.chars().count(), EXCERPT_LEN + 3);
    }

    #[test]
    fn test_field_helpers() {
        let obj = normalize(
            r#"{"Name": "  Phone ", "price": "44,999", "image": null, "amount": "abc", "blank": " "}"#,
        )
        .unwrap();
        assert_eq!(string_field(&obj, &["name"]), Some("Phone".to_string()));
        assert_eq!(number_field(&obj, &["price"]), Some(44999.0));
        assert_eq!(string_field(&obj, &["image"]), None);
        assert_eq!(number_field(&obj, &["amount"]), None);
        assert_eq!(string_field(&obj, &["blank"]), None);
        assert_eq!(string_field(&obj, &["missing", "name"]), Some("Phone".to_string()));
    }
}
