use std::collections::BTreeMap;

use serde_json::Value;

use crate::error::{AssessmentError, Result};
use crate::json_block::ParsedFields;

/// Keeps non-blank trimmed entries, pads with `filler` and truncates to exactly `n`.
pub fn ensure_list_len<S: AsRef<str>>(items: &[S], n: usize, filler: &str) -> Vec<String> {
    let mut out: Vec<String> = items
        .iter()
        .map(|item| item.as_ref().trim())
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect();

    while out.len() < n {
        out.push(filler.to_string());
    }
    out.truncate(n);
    out
}

/// Keeps non-blank trimmed entries and caps the list at `max` without padding.
pub fn cap_list<S: AsRef<str>>(items: &[S], max: usize) -> Vec<String> {
    items
        .iter()
        .map(|item| item.as_ref().trim())
        .filter(|item| !item.is_empty())
        .take(max)
        .map(str::to_string)
        .collect()
}

/// Coerces a receipt amount into whole currency units.
///
/// Every `.` and `,` is a grouping separator here, never a decimal point, so
/// `"1.200.000"` and `"1,200,000"` both become `1200000.0`.
pub fn normalize_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => normalize_amount_str(s),
        _ => None,
    }
}

pub fn normalize_amount_str(raw: &str) -> Option<f64> {
    // Separators carry no meaning, so only the digits survive.
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();

    if digits.is_empty() {
        return None;
    }
    digits.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Trims an account identifier and drops internal whitespace. No format checks.
pub fn normalize_account(value: &Value) -> Option<String> {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };

    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.is_empty() {
        None
    } else {
        Some(compact)
    }
}

/// Typed, defaulting accessors over the fields a model returned.
///
/// Absent or `null` fields fall back silently. A value that is present but cannot
/// be coerced to the declared type is an error, which sends the request to the
/// fallback path.
pub struct FieldReader<'a> {
    fields: &'a ParsedFields,
}

impl<'a> FieldReader<'a> {
    pub fn new(fields: &'a ParsedFields) -> Self {
        Self { fields }
    }

    fn get(&self, key: &str) -> Option<&'a Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    pub fn number(&self, key: &str, default: f64) -> Result<f64> {
        let parsed = match self.get(key) {
            None => return Ok(default),
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            Some(_) => None,
        };

        match parsed {
            Some(v) if v.is_finite() => Ok(v),
            _ => Err(AssessmentError::invalid_field(key, "expected a finite number")),
        }
    }

    /// Trimmed string value; `None` when absent, blank or not a string.
    pub fn text(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            _ => None,
        }
    }

    /// Like [`text`](Self::text) but also accepts numbers, which models emit for ids.
    pub fn scalar_text(&self, key: &str) -> Option<String> {
        match self.get(key) {
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => self.text(key),
        }
    }

    /// String entries of an array field. A bare string counts as a single entry.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => vec![s.clone()],
            _ => Vec::new(),
        }
    }

    /// Confidence map with every value a finite float clamped to `[0, 1]`.
    /// Non-numeric entries are dropped.
    pub fn confidence(&self, key: &str) -> BTreeMap<String, f64> {
        let Some(Value::Object(map)) = self.get(key) else {
            return BTreeMap::new();
        };

        map.iter()
            .filter_map(|(name, v)| {
                let value = match v {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                }?;
                value
                    .is_finite()
                    .then(|| (name.clone(), value.clamp(0.0, 1.0)))
            })
            .collect()
    }

    pub fn object(&self, key: &str) -> Option<&'a ParsedFields> {
        match self.get(key) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        }
    }

    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        self.get(key)
    }
}

/// Truncates to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
