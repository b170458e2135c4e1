//! Numeric builtins: `abs`, `ceil`, `floor`, `round`, `min`, `max`, `pow`,
//! `sqrt`, `random`, `pi`, `e`.
//!
//! Flat function-call namespace, grounded on the teacher's
//! `BuiltinRegistry::register_math_functions` dispatch pattern rather than
//! a `Math.*` member-access style.

use relay_error::RelayError;
use serde_json::{json, Value};

use crate::value_utils::as_f64;

use super::{check_arg_count, check_min_arg_count};

pub fn abs(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("abs", args, 1)?;
    Ok(json!(as_f64(&args[0])?.abs()))
}

pub fn ceil(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("ceil", args, 1)?;
    Ok(json!(as_f64(&args[0])?.ceil()))
}

pub fn floor(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("floor", args, 1)?;
    Ok(json!(as_f64(&args[0])?.floor()))
}

pub fn round(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("round", args, 1)?;
    Ok(json!(as_f64(&args[0])?.round()))
}

pub fn min(args: &[Value]) -> Result<Value, RelayError> {
    check_min_arg_count("min", args, 1)?;
    let mut best = as_f64(&args[0])?;
    for arg in &args[1..] {
        best = best.min(as_f64(arg)?);
    }
    Ok(json!(best))
}

pub fn max(args: &[Value]) -> Result<Value, RelayError> {
    check_min_arg_count("max", args, 1)?;
    let mut best = as_f64(&args[0])?;
    for arg in &args[1..] {
        best = best.max(as_f64(arg)?);
    }
    Ok(json!(best))
}

pub fn pow(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("pow", args, 2)?;
    Ok(json!(as_f64(&args[0])?.powf(as_f64(&args[1])?)))
}

pub fn sqrt(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("sqrt", args, 1)?;
    let n = as_f64(&args[0])?;
    if n < 0.0 {
        return Err(RelayError::expr("sqrt of a negative number is not real"));
    }
    Ok(json!(n.sqrt()))
}

/// Pseudo-random float in `[0, 1)`. Impure by design — exempt from the
/// deterministic-replay property, see `RelayError`'s non-goals note.
pub fn random(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("random", args, 0)?;
    Ok(json!(rand::random::<f64>()))
}

pub fn pi(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("pi", args, 0)?;
    Ok(json!(std::f64::consts::PI))
}

pub fn e(args: &[Value]) -> Result<Value, RelayError> {
    check_arg_count("e", args, 0)?;
    Ok(json!(std::f64::consts::E))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_handles_negative() {
        assert_eq!(abs(&[json!(-3.5)]).unwrap(), json!(3.5));
    }

    #[test]
    fn sqrt_rejects_negative() {
        assert!(sqrt(&[json!(-1)]).is_err());
    }

    #[test]
    fn min_max_over_many_args() {
        assert_eq!(min(&[json!(3), json!(1), json!(2)]).unwrap(), json!(1.0));
        assert_eq!(max(&[json!(3), json!(1), json!(2)]).unwrap(), json!(3.0));
    }

    #[test]
    fn random_is_within_unit_interval() {
        let v = random(&[]).unwrap();
        let f = v.as_f64().unwrap();
        assert!((0.0..1.0).contains(&f));
    }
}
