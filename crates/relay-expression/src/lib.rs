//! Sandboxed expression and template evaluator.
//!
//! There is no host `eval`: expressions are tokenized, parsed into a closed
//! AST (`ast::Expr`), and walked by a tree-walking evaluator bounded by a
//! recursion depth, a wall-clock timeout, and a node-visit ceiling. Template
//! strings interleave plain `{{path}}` lookups with spliced `${expr}` holes.

mod ast;
mod builtins;
mod context;
mod eval;
mod parser;
mod template;
mod validate;
mod value_utils;

pub use ast::{BinaryOp, Expr};
pub use context::{EvaluationContext, EvaluationContextBuilder};
pub use eval::{EvalBudget, Evaluator};
pub use parser::Parser;
pub use template::TemplateEngine;
pub use validate::{validate_expression, ValidationResult};
pub use value_utils::is_truthy;

use relay_error::RelayError;
use serde_json::Value;

/// Parses and evaluates `source` against `ctx` in a single call, using the
/// default time/recursion/node-visit budget.
pub fn evaluate(source: &str, ctx: &EvaluationContext) -> Result<Value, RelayError> {
    let expr = Parser::parse(source)?;
    Evaluator::new().eval(&expr, ctx, &mut EvalBudget::default())
}

/// Renders a `{{...}}`/`${...}` template string against `ctx`.
pub fn evaluate_template(template: &str, ctx: &EvaluationContext) -> String {
    TemplateEngine::new().render(template, ctx)
}

/// Runs `source` against `ctx` and reports success/failure without
/// propagating an error, matching the engine's "test this expression
/// against sample data" surface.
pub fn test_expression(source: &str, ctx: &EvaluationContext) -> ValidationResult {
    match evaluate(source, ctx) {
        Ok(_) => ValidationResult {
            ok: true,
            error: None,
        },
        Err(e) => ValidationResult {
            ok: false,
            error: Some(e.to_string()),
        },
    }
}

pub mod prelude {
    pub use crate::{
        evaluate, evaluate_template, is_truthy, test_expression, validate_expression,
        EvaluationContext, EvaluationContextBuilder, Evaluator, TemplateEngine, ValidationResult,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn evaluate_end_to_end() {
        let ctx = EvaluationContext::builder()
            .node("fetchUser", json!({"age": 30}))
            .build();
        assert_eq!(evaluate("node.fetchUser.age >= 18", &ctx).unwrap(), json!(true));
    }

    #[test]
    fn test_expression_reports_failure_without_propagating() {
        let ctx = EvaluationContext::default();
        let result = test_expression("1 / 0", &ctx);
        assert!(!result.ok);
    }
}
