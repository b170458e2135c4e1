//! Type-predicate builtins: `isString`, `isNumber`, `isBoolean`, `isArray`,
//! `isObject`.

use relay_error::RelayError;
use serde_json::{json, Value};

use super::check_arg_count;

pub fn is_string(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("isString", args, 1)?;
    Ok(json!(matches!(args[0], Value::String(_))))
}

pub fn is_number(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("isNumber", args, 1)?;
    Ok(json!(matches!(args[0], Value::Number(_))))
}

pub fn is_boolean(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("isBoolean", args, 1)?;
    Ok(json!(matches!(args[0], Value::Bool(_))))
}

pub fn is_array(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("isArray", args, 1)?;
    Ok(json!(matches!(args[0], Value::Array(_))))
}

pub fn is_object(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("isObject", args, 1)?;
    Ok(json!(matches!(args[0], Value::Object(_))))
}
