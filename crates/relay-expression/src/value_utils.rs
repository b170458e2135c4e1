//! Coercion helpers shared by the evaluator and the builtin functions.
//!
//! Grounded on the teacher's `expression/src/value_utils.rs` coercion rules:
//! truthiness follows JSON-ish semantics (empty string/array/object is
//! falsy, zero is falsy), and numeric coercion accepts numeric strings.

use relay_error::RelayError;
use serde_json::Value;

pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

pub fn as_f64(value: &Value) -> Result<f64, RelayError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| RelayError::expr("number is out of range for f64")),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| RelayError::expr(format!("cannot coerce string '{s}' to a number"))),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        other => Err(RelayError::expr(format!(
            "cannot coerce {} to a number",
            type_name(other)
        ))),
    }
}

pub fn as_str(value: &Value) -> Result<String, RelayError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(_) | Value::Bool(_) => Ok(display_value(value)),
        other => Err(RelayError::expr(format!(
            "cannot coerce {} to a string",
            type_name(other)
        ))),
    }
}

/// Stringifies a value the way a template hole would: numbers and booleans
/// print plainly, `null` prints as an empty string, strings pass through
/// unescaped, and arrays/objects render as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(_) | Value::Object(_) => {
            serde_json::to_string(value).unwrap_or_default()
        }
    }
}

pub fn numbers_equal(a: f64, b: f64) -> bool {
    (a - b).abs() < f64::EPSILON
}
