//! Pulls the JSON payload out of free-form model output.
//!
//! Models like to wrap their answer in prose or markdown fences. We take the span
//! from the first `{` to the last `}` and parse it strictly: no brace repair, no
//! partial results.

use serde_json::{Map, Value};

use crate::error::{AssessmentError, Result};

/// Field name → value mapping taken from a model response. Untrusted until a
/// task normalizes it.
pub type ParsedFields = Map<String, Value>;

/// Returns the outermost `{...}` span of `raw`.
pub fn extract_json_block(raw: &str) -> Result<&str> {
    if raw.trim().is_empty() {
        return Err(AssessmentError::EmptyOutput);
    }

    match (raw.find('{'), raw.rfind('}')) {
        (Some(start), Some(end)) if end > start => Ok(&raw[start..=end]),
        _ => Err(AssessmentError::NoJsonObject),
    }
}

/// Extracts the JSON block and parses it into an object.
pub fn parse_json_object(raw: &str) -> Result<ParsedFields> {
    let block = extract_json_block(raw)?;
    let value: Value = serde_json::from_str(block).map_err(AssessmentError::InvalidJson)?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(AssessmentError::NotAnObject),
    }
}
