//! `transform` (§4.3): reads `input` via a dotted accessor path, then
//! applies `map`, `filter`, `extract`, `format` steps in order.

use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_expression::{evaluate, is_truthy, EvaluationContext, TemplateEngine};
use relay_workflow::NodeDefinition;
use serde_json::{json, Map, Value};

use crate::adapter::ConnectorAdapter;
use crate::eval_ctx::build_context;

fn with_item(base: &EvaluationContext, item: &Value, index: usize) -> EvaluationContext {
    let mut ctx = base.clone();
    ctx.set_execution_var("item", item.clone());
    ctx.set_execution_var("index", json!(index));
    ctx
}

fn apply_map(current: Value, expression: &str, field: Option<&str>, base: &EvaluationContext) -> Result<Value, RelayError> {
    if let Value::Array(items) = current {
        let mapped = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let item_ctx = with_item(base, &item, i);
                let result = evaluate(expression, &item_ctx)?;
                Ok(match field {
                    Some(f) => {
                        let mut obj = item.as_object().cloned().unwrap_or_default();
                        obj.insert(f.to_string(), result);
                        Value::Object(obj)
                    }
                    None => result,
                })
            })
            .collect::<Result<Vec<_>, RelayError>>()?;
        Ok(Value::Array(mapped))
    } else {
        let item_ctx = with_item(base, &current, 0);
        evaluate(expression, &item_ctx)
    }
}

fn apply_filter(current: Value, condition: &str, base: &EvaluationContext) -> Result<Value, RelayError> {
    let Value::Array(items) = current else {
        return Err(RelayError::validation("transform filter step requires an array input"));
    };
    let mut kept = Vec::new();
    for (i, item) in items.into_iter().enumerate() {
        let item_ctx = with_item(base, &item, i);
        if is_truthy(&evaluate(condition, &item_ctx)?) {
            kept.push(item);
        }
    }
    Ok(Value::Array(kept))
}

fn extract_fields(value: &Value, fields: &[String]) -> Value {
    let Some(obj) = value.as_object() else {
        return Value::Null;
    };
    let mut out = Map::new();
    for field in fields {
        if let Some(v) = obj.get(field) {
            out.insert(field.clone(), v.clone());
        }
    }
    Value::Object(out)
}

fn apply_extract(current: Value, fields: &[String]) -> Value {
    match current {
        Value::Array(items) => Value::Array(items.iter().map(|v| extract_fields(v, fields)).collect()),
        other => extract_fields(&other, fields),
    }
}

fn apply_format(current: &Value, template: &str, base: &EvaluationContext) -> Value {
    let mut ctx = base.clone();
    ctx.set_execution_var("item", current.clone());
    Value::String(TemplateEngine::new().render(template, &ctx))
}

pub fn apply_transform(
    config: &Value,
    prev_results: &HashMap<NodeId, Value>,
    ctx: &ExecutionContext,
) -> Result<Value, RelayError> {
    let base = build_context(prev_results, ctx);

    let mut current = match config.get("input").and_then(Value::as_str) {
        Some(path) => evaluate(path, &base)?,
        None => Value::Null,
    };

    let steps = config
        .get("transformations")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    for step in &steps {
        let op = step
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("transform step requires an 'op' field"))?;
        current = match op {
            "map" => {
                let expression = step
                    .get("expression")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RelayError::validation("map step requires an 'expression'"))?;
                let field = step.get("field").and_then(Value::as_str);
                apply_map(current, expression, field, &base)?
            }
            "filter" => {
                let condition = step
                    .get("condition")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RelayError::validation("filter step requires a 'condition'"))?;
                apply_filter(current, condition, &base)?
            }
            "extract" => {
                let fields: Vec<String> = step
                    .get("fields")
                    .and_then(Value::as_array)
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
                    .unwrap_or_default();
                apply_extract(current, &fields)
            }
            "format" => {
                let template = step
                    .get("template")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RelayError::validation("format step requires a 'template'"))?;
                apply_format(&current, template, &base)
            }
            other => {
                return Err(RelayError::validation(format!(
                    "unknown transform step '{other}', expected map|filter|extract|format"
                )))
            }
        };
    }

    let output_field = config
        .get("outputField")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::validation("transform node requires an 'outputField'"))?;

    let mut result = Map::new();
    result.insert(output_field.to_string(), current);
    Ok(Value::Object(result))
}

pub struct TransformAdapter;

#[async_trait]
impl ConnectorAdapter for TransformAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        apply_transform(&node.config, prev_results, ctx)
    }
}
