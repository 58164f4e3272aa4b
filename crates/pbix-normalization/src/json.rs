//! Canonical JSON.
//!
//! Object keys are sorted by code point, arrays keep their order, integral
//! floats collapse to integers, and rendering always uses two-space
//! indentation with `\n` line endings and a trailing newline.

use serde_json::{Map, Number, Value};

use crate::error::Result;

/// Largest magnitude at which every integer is exactly representable as f64.
const MAX_EXACT_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Parse JSON text, tolerating a leading byte-order mark.
pub fn parse_json(text: &str) -> Result<Value> {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    Ok(serde_json::from_str(text)?)
}

/// Return the canonical form of `value`.
pub fn normalize_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut out = Map::new();
            for (key, child) in entries {
                out.insert(key.clone(), normalize_json(child));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_json).collect()),
        Value::Number(number) => Value::Number(canonical_number(number)),
        other => other.clone(),
    }
}

fn canonical_number(number: &Number) -> Number {
    if number.is_i64() || number.is_u64() {
        return number.clone();
    }
    match number.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 && f.abs() <= MAX_EXACT_INTEGER => {
            // -0.0 becomes 0
            Number::from(f as i64)
        }
        _ => number.clone(),
    }
}

/// Render the canonical, indented text of `value`.
pub fn render_json(value: &Value) -> Result<String> {
    let mut text = serde_json::to_string_pretty(&normalize_json(value))?;
    text.push('\n');
    Ok(text)
}

/// Render the canonical single-line text of `value`.
pub fn render_json_compact(value: &Value) -> Result<String> {
    Ok(serde_json::to_string(&normalize_json(value))?)
}
