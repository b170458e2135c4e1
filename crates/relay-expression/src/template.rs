//! Template interpolation: `{{path}}` plain lookups and `${expr}` spliced
//! expressions embedded in arbitrary string fields.
//!
//! Grounded on `expression/src/template.rs`'s dual-hole syntax. `{{...}}`
//! only ever does a dotted-path lookup against the evaluation context (no
//! operators, no function calls) and stringifies the result; `${...}` runs
//! the full restricted expression language and splices in its value. A hole
//! that fails to resolve is left in the output verbatim rather than
//! aborting the whole template, matching the teacher's best-effort render.

use serde_json::Value;

use crate::context::EvaluationContext;
use crate::eval::{EvalBudget, Evaluator};
use crate::parser::Parser;
use crate::value_utils::display_value;

pub struct TemplateEngine {
    evaluator: Evaluator,
}

impl TemplateEngine {
    pub fn new() -> Self {
        Self {
            evaluator: Evaluator::new(),
        }
    }

    /// Renders every `{{path}}` and `${expr}` hole in `template` against `ctx`.
    pub fn render(&self, template: &str, ctx: &EvaluationContext) -> String {
        self.render_with(template, ctx, &mut |_| {})
    }

    /// Same as [`Self::render`], calling `on_failed_hole` with the source of
    /// every `${expr}` hole that fails to evaluate, before it's left
    /// verbatim in the output. `{{path}}` holes that simply miss are not
    /// reported — only expression holes that actually raised an error.
    pub fn render_with(&self, template: &str, ctx: &EvaluationContext, on_failed_hole: &mut dyn FnMut(&str)) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        loop {
            match find_next_hole(rest) {
                Some(hole) => {
                    out.push_str(&rest[..hole.start]);
                    out.push_str(&self.render_hole(&hole, ctx, on_failed_hole));
                    rest = &rest[hole.end..];
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            }
        }
        out
    }

    /// Walks a JSON value, rendering every string leaf as a template and
    /// leaving the structure of arrays/objects untouched.
    pub fn render_value(&self, value: &Value, ctx: &EvaluationContext) -> Value {
        self.render_value_with(value, ctx, &mut |_| {})
    }

    /// Same as [`Self::render_value`], reporting failed `${expr}` holes via
    /// `on_failed_hole` as it recurses.
    pub fn render_value_with(&self, value: &Value, ctx: &EvaluationContext, on_failed_hole: &mut dyn FnMut(&str)) -> Value {
        match value {
            Value::String(s) => {
                // A value that is *only* one `${...}` hole splices its native
                // type instead of being stringified, matching the teacher's
                // "maybe vs template" distinction.
                if let Some(expr_src) = as_sole_expression_hole(s) {
                    return self.eval_expression(expr_src, ctx).unwrap_or_else(|_| {
                        on_failed_hole(expr_src);
                        Value::String(s.clone())
                    });
                }
                Value::String(self.render_with(s, ctx, on_failed_hole))
            }
            Value::Array(items) => {
                Value::Array(items.iter().map(|v| self.render_value_with(v, ctx, on_failed_hole)).collect())
            }
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_value_with(v, ctx, on_failed_hole)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    fn render_hole(&self, hole: &Hole, ctx: &EvaluationContext, on_failed_hole: &mut dyn FnMut(&str)) -> String {
        let source = hole.source;
        match hole.kind {
            HoleKind::Path => self.resolve_path(source, ctx).map_or_else(
                || format!("{{{{{source}}}}}"),
                |v| display_value(&v),
            ),
            HoleKind::Expression => self.eval_expression(source, ctx).map_or_else(
                |_| {
                    on_failed_hole(source);
                    format!("${{{source}}}")
                },
                |v| display_value(&v),
            ),
        }
    }

    fn resolve_path(&self, path: &str, ctx: &EvaluationContext) -> Option<Value> {
        let expr = Parser::parse(path.trim()).ok()?;
        self.evaluator
            .eval(&expr, ctx, &mut EvalBudget::default())
            .ok()
    }

    fn eval_expression(&self, source: &str, ctx: &EvaluationContext) -> Result<Value, relay_error::RelayError> {
        let expr = Parser::parse(source.trim())?;
        self.evaluator.eval(&expr, ctx, &mut EvalBudget::default())
    }
}

impl Default for TemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

enum HoleKind {
    Path,
    Expression,
}

struct Hole<'a> {
    start: usize,
    end: usize,
    source: &'a str,
    kind: HoleKind,
}

fn find_next_hole(s: &str) -> Option<Hole<'_>> {
    let expr_pos = s.find("${");
    let path_pos = s.find("{{");
    match (expr_pos, path_pos) {
        (Some(e), Some(p)) if e < p => find_expression_hole(s, e),
        (Some(e), None) => find_expression_hole(s, e),
        (_, Some(p)) => find_path_hole(s, p),
        (None, None) => None,
    }
}

fn find_expression_hole(s: &str, start: usize) -> Option<Hole<'_>> {
    let close = s[start + 2..].find('}')? + start + 2;
    Some(Hole {
        start,
        end: close + 1,
        source: &s[start + 2..close],
        kind: HoleKind::Expression,
    })
}

fn find_path_hole(s: &str, start: usize) -> Option<Hole<'_>> {
    let close = s[start + 2..].find("}}")? + start + 2;
    Some(Hole {
        start,
        end: close + 2,
        source: &s[start + 2..close],
        kind: HoleKind::Path,
    })
}

/// `Some(expr)` if `s` is exactly one `${...}` hole with nothing else around it.
fn as_sole_expression_hole(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    let inner = trimmed.strip_prefix("${")?.strip_suffix('}')?;
    if inner.contains("${") {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn plain_path_hole_stringifies() {
        let ctx = EvaluationContext::builder()
            .node("fetchUser", json!({"name": "Ada"}))
            .build();
        let out = TemplateEngine::new().render("Hello, {{node.fetchUser.name}}!", &ctx);
        assert_eq!(out, "Hello, Ada!");
    }

    #[test]
    fn expression_hole_evaluates() {
        let ctx = EvaluationContext::default();
        let out = TemplateEngine::new().render("total: ${1 + 2}", &ctx);
        assert_eq!(out, "total: 3");
    }

    #[test]
    fn unresolvable_hole_is_left_verbatim() {
        let ctx = EvaluationContext::default();
        let out = TemplateEngine::new().render("{{node.missing.field}}", &ctx);
        assert_eq!(out, "{{node.missing.field}}");
    }

    #[test]
    fn sole_expression_hole_splices_native_type() {
        let ctx = EvaluationContext::builder()
            .execution_var("items", json!([1, 2, 3]))
            .build();
        let rendered = TemplateEngine::new().render_value(&json!("${items}"), &ctx);
        assert_eq!(rendered, json!([1, 2, 3]));
    }

    #[test]
    fn render_value_recurses_into_objects() {
        let ctx = EvaluationContext::builder()
            .execution_var("name", json!("Ada"))
            .build();
        let input = json!({"greeting": "hi {{name}}"});
        let rendered = TemplateEngine::new().render_value(&input, &ctx);
        assert_eq!(rendered, json!({"greeting": "hi Ada"}));
    }
}
