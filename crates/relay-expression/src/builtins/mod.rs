//! The builtin function table.
//!
//! Grounded on `expression/src/builtins/mod.rs`'s `BuiltinRegistry`: a flat
//! `HashMap<String, fn(...)>` dispatch, not a `Math.*`-style namespace. The
//! function set is deliberately narrower than the teacher's — only the
//! helpers the engine's expression surface names are registered; the
//! teacher's broader string/array/higher-order library (`filter`, `map`,
//! `reduce`, `split`, `slice`, ...) is out of scope here.

mod datetime;
mod json;
mod math;
mod predicates;
mod util;

use std::collections::HashMap;

use relay_error::RelayError;
use serde_json::Value;

pub type BuiltinFunction = fn(&[Value]) -> Result<Value, RelayError>;

#[derive(Debug)]
pub struct BuiltinRegistry {
    functions: HashMap<&'static str, BuiltinFunction>,
}

impl BuiltinRegistry {
    pub fn new() -> Self {
        let mut functions: HashMap<&'static str, BuiltinFunction> = HashMap::new();
        functions.insert("abs", math::abs);
        functions.insert("ceil", math::ceil);
        functions.insert("floor", math::floor);
        functions.insert("round", math::round);
        functions.insert("min", math::min);
        functions.insert("max", math::max);
        functions.insert("pow", math::pow);
        functions.insert("sqrt", math::sqrt);
        functions.insert("random", math::random);
        functions.insert("pi", math::pi);
        functions.insert("e", math::e);

        functions.insert("now", datetime::now);
        functions.insert("timestamp", datetime::timestamp);
        functions.insert("formatDate", datetime::format_date);

        functions.insert("isString", predicates::is_string);
        functions.insert("isNumber", predicates::is_number);
        functions.insert("isBoolean", predicates::is_boolean);
        functions.insert("isArray", predicates::is_array);
        functions.insert("isObject", predicates::is_object);

        functions.insert("jsonEncode", json::json_encode);
        functions.insert("jsonDecode", json::json_decode);

        functions.insert("isEmpty", util::is_empty);
        functions.insert("slugify", util::slugify);
        functions.insert("truncate", util::truncate);
        functions.insert("base64Encode", util::base64_encode);
        functions.insert("base64Decode", util::base64_decode);
        functions.insert("toString", util::to_string);
        functions.insert("toNumber", util::to_number);

        Self { functions }
    }

    pub fn call(&self, name: &str, args: &[Value]) -> Result<Value, RelayError> {
        let f = self
            .functions
            .get(name)
            .ok_or_else(|| RelayError::expr(format!("unknown function '{name}'")))?;
        f(args)
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    pub fn function_names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.functions.keys().copied().collect();
        names.sort_unstable();
        names
    }
}

impl Default for BuiltinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) fn check_arg_count(name: &str, args: &[Value], expected: usize) -> Result<(), RelayError> {
    if args.len() != expected {
        return Err(RelayError::expr(format!(
            "'{name}' expects {expected} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

pub(crate) fn check_min_arg_count(
    name: &str,
    args: &[Value],
    min: usize,
) -> Result<(), RelayError> {
    if args.len() < min {
        return Err(RelayError::expr(format!(
            "'{name}' expects at least {min} argument(s), got {}",
            args.len()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unknown_function_name_is_an_error() {
        let registry = BuiltinRegistry::new();
        assert!(registry.call("doesNotExist", &[]).is_err());
    }

    #[test]
    fn registry_dispatches_flat_function_names() {
        let registry = BuiltinRegistry::new();
        assert_eq!(registry.call("abs", &[json!(-4)]).unwrap(), json!(4.0));
        assert!(registry.has_function("slugify"));
        assert!(!registry.has_function("Math.abs"));
    }

    #[test]
    fn function_names_lists_every_registered_helper() {
        let registry = BuiltinRegistry::new();
        let names = registry.function_names();
        assert!(names.contains(&"jsonEncode"));
        assert!(names.contains(&"isEmpty"));
        assert_eq!(names.len(), 22);
    }
}
