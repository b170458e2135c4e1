//! Grab-bag of general-purpose builtins named directly by the engine's
//! expression surface: `isEmpty`, `slugify`, `truncate`, `base64Encode`,
//! `base64Decode`, `toString`, `toNumber`.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use relay_error::RelayError;
use serde_json::{json, Value};

use crate::value_utils::{as_f64, as_str, display_value, is_truthy};

use super::{check_arg_count, check_min_arg_count};

pub fn is_empty(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("isEmpty", args, 1)?;
    let empty = match &args[0] {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        other => !is_truthy(other),
    };
    Ok(json!(empty))
}

/// Lowercases, trims, and replaces runs of non-alphanumerics with a single
/// hyphen, e.g. `"Hello, World!"` -> `"hello-world"`.
pub fn slugify(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("slugify", args, 1)?;
    let input = as_str(&args[0])?;
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true;
    for c in input.to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
            last_was_hyphen = false;
        } else if !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
    }
    if slug.ends_with('-') {
        slug.pop();
    }
    Ok(Value::String(slug))
}

/// `truncate(text, maxLen)` truncates on a char boundary and appends `...`
/// when truncation actually occurred.
pub fn truncate(args: &[Value]) -> Result<Value, RelayError> {
    check_min_arg_count("truncate", args, 2)?;
    let input = as_str(&args[0])?;
    let max_len = as_f64(&args[1])? as usize;
    if input.chars().count() <= max_len {
        return Ok(Value::String(input));
    }
    let truncated: String = input.chars().take(max_len).collect();
    Ok(Value::String(format!("{truncated}...")))
}

pub fn base64_encode(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("base64Encode", args, 1)?;
    let input = as_str(&args[0])?;
    Ok(Value::String(BASE64.encode(input.as_bytes())))
}

pub fn base64_decode(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("base64Decode", args, 1)?;
    let input = as_str(&args[0])?;
    let bytes = BASE64
        .decode(input.as_bytes())
        .map_err(|e| RelayError::expr(format!("base64Decode: {e}")))?;
    String::from_utf8(bytes)
        .map(Value::String)
        .map_err(|_| RelayError::expr("base64Decode: decoded bytes are not valid UTF-8"))
}

pub fn to_string(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("toString", args, 1)?;
    Ok(Value::String(display_value(&args[0])))
}

pub fn to_number(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("toNumber", args, 1)?;
    Ok(json!(as_f64(&args[0])?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(
            slugify(&[json!("Hello, World!")]).unwrap(),
            json!("hello-world")
        );
    }

    #[test]
    fn truncate_only_appends_ellipsis_when_shortened() {
        assert_eq!(
            truncate(&[json!("hello"), json!(10)]).unwrap(),
            json!("hello")
        );
        assert_eq!(
            truncate(&[json!("hello world"), json!(5)]).unwrap(),
            json!("hello...")
        );
    }

    #[test]
    fn base64_round_trips() {
        let encoded = base64_encode(&[json!("hello")]).unwrap();
        assert_eq!(base64_decode(&[encoded]).unwrap(), json!("hello"));
    }

    #[test]
    fn is_empty_treats_null_and_empty_collections_as_empty() {
        assert_eq!(is_empty(&[Value::Null]).unwrap(), json!(true));
        assert_eq!(is_empty(&[json!([])]).unwrap(), json!(true));
        assert_eq!(is_empty(&[json!([1])]).unwrap(), json!(false));
    }
}
