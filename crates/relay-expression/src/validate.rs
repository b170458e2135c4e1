//! Static validation: can this string be parsed, and does it contain any
//! token sequence that has no business appearing in a sandboxed expression
//! even if the parser would otherwise accept it as an identifier.

use serde::{Deserialize, Serialize};

use crate::parser::Parser;

/// Substrings that never belong in an expression under any legitimate
/// builtin or variable name. A defence-in-depth check behind the parser's
/// already-closed grammar, not the primary enforcement mechanism.
const HOSTILE_PATTERNS: &[&str] = &[
    "require(",
    "import ",
    "eval(",
    "Function(",
    "process.",
    "global.",
    "__proto__",
    "constructor",
    "prototype",
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub ok: bool,
    pub error: Option<String>,
}

pub fn validate_expression(source: &str) -> ValidationResult {
    if let Some(pattern) = HOSTILE_PATTERNS.iter().find(|p| source.contains(*p)) {
        return ValidationResult {
            ok: false,
            error: Some(format!("expression contains a disallowed token: '{pattern}'")),
        };
    }
    match Parser::parse(source) {
        Ok(_) => ValidationResult { ok: true, error: None },
        Err(e) => ValidationResult {
            ok: false,
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_expression_passes() {
        let result = validate_expression("1 + 2 * 3");
        assert!(result.ok);
        assert!(result.error.is_none());
    }

    #[test]
    fn malformed_expression_fails() {
        let result = validate_expression("1 +");
        assert!(!result.ok);
    }

    #[test]
    fn hostile_token_is_rejected_even_if_parseable() {
        let result = validate_expression("process.exit(1)");
        assert!(!result.ok);
        assert!(result.error.unwrap().contains("disallowed"));
    }
}
