//! JSON extraction from model replies
//!
//! Models in JSON mode usually answer with a bare object, but some wrap it
//! in a fenced ```json block or add a sentence of prose around it. The
//! object itself must still parse.

use super::CompletionFailure;
use serde_json::{Map, Value};
use tracing::debug;

/// Locate the JSON object inside a reply.
///
/// Checks, in order: a ```json fence, a bare ``` fence, then the span from
/// the first `{` to the last `}`.
pub fn extract_json(text: &str) -> Option<&str> {
    for fence in ["```json", "```JSON"] {
        if let Some(start) = text.find(fence) {
            let content = &text[start + fence.len()..];
            if let Some(end) = content.find("```") {
                return Some(content[..end].trim());
            }
        }
    }

    if let Some(start) = text.find("```") {
        let content = &text[start + 3..];
        if let Some(end) = content.find("```") {
            let inner = content[..end].trim();
            if inner.starts_with('{') {
                return Some(inner);
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| text[start..=end].trim())
}

/// Parse a reply and check that every expected key is present.
pub fn parse_fields(
    text: &str,
    expected_fields: &[String],
) -> Result<Map<String, Value>, CompletionFailure> {
    let json = extract_json(text)
        .ok_or_else(|| CompletionFailure::MalformedJson("no JSON object in reply".to_string()))?;

    let value: Value = serde_json::from_str(json)
        .map_err(|e| CompletionFailure::MalformedJson(e.to_string()))?;

    let fields = match value {
        Value::Object(map) => map,
        other => {
            return Err(CompletionFailure::MalformedJson(format!(
                "expected a JSON object, got {}",
                type_name(&other)
            )))
        }
    };

    if let Some(missing) = expected_fields.iter().find(|f| !fields.contains_key(*f)) {
        debug!(field = %missing, "Completion is missing an expected field");
        return Err(CompletionFailure::MissingField(missing.clone()));
    }

    Ok(fields)
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
