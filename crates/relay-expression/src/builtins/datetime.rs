//! Date and time builtins: `now`, `timestamp`, `formatDate`.
//!
//! `now()` and `timestamp()` are impure, same exemption as `random()`.

use chrono::{DateTime, Utc};
use relay_error::RelayError;
use serde_json::{json, Value};

use crate::value_utils::as_str;

use super::{check_arg_count, check_min_arg_count};

pub fn now(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("now", args, 0)?;
    Ok(json!(Utc::now().to_rfc3339()))
}

pub fn timestamp(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("timestamp", args, 0)?;
    Ok(json!(Utc::now().timestamp_millis()))
}

/// `formatDate(isoString, pattern)` — `pattern` uses `chrono::format::strftime`
/// specifiers (e.g. `%Y-%m-%d`).
pub fn format_date(args: &[Value]) -> Result<Value, RelayError> {
    check_min_arg_count("formatDate", args, 1)?;
    let input = as_str(&args[0])?;
    let parsed = DateTime::parse_from_rfc3339(&input)
        .map_err(|e| RelayError::expr(format!("invalid date '{input}': {e}")))?;
    let pattern = if args.len() > 1 {
        as_str(&args[1])?
    } else {
        "%Y-%m-%dT%H:%M:%S%.3fZ".to_string()
    };
    Ok(json!(parsed.format(&pattern).to_string()))
}
