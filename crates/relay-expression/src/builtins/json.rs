//! JSON (de)serialization builtins: `jsonEncode`, `jsonDecode`.

use relay_error::RelayError;
use serde_json::Value;

use crate::value_utils::as_str;

use super::check_arg_count;

pub fn json_encode(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("jsonEncode", args, 1)?;
    let encoded =
        serde_json::to_string(&args[0]).map_err(|e| RelayError::expr(format!("jsonEncode: {e}")))?;
    Ok(Value::String(encoded))
}

pub fn json_decode(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("jsonDecode", args, 1)?;
    let text = as_str(&args[0])?;
    serde_json::from_str(&text).map_err(|e| RelayError::expr(format!("jsonDecode: invalid JSON, {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_through_encode_decode() {
        let value = json!({"a": [1, 2, 3]});
        let encoded = json_encode(&[value.clone()]).unwrap();
        let decoded = json_decode(&[encoded]).unwrap();
        assert_eq!(decoded, value);
    }

    #[test]
    fn decode_rejects_malformed_json() {
        assert!(json_decode(&[json!("{not json")]).is_err());
    }
}
