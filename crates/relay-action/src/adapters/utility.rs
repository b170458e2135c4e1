//! The `utility` connector (§4.4): `merge|filter|sort|group|unique|format`
//! data-shaping ops, selected by `config.op`.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_expression::{evaluate, is_truthy, TemplateEngine};
use relay_workflow::NodeDefinition;
use serde_json::{Map, Value};

use crate::adapter::ConnectorAdapter;
use crate::eval_ctx::build_context;

fn resolve_input(config: &Value, key: &str, base: &relay_expression::EvaluationContext) -> Result<Value, RelayError> {
    let path = config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::validation(format!("utility op requires a '{key}' accessor path")))?;
    evaluate(path, base)
}

fn field_of(item: &Value, field: &str) -> Value {
    item.get(field).cloned().unwrap_or(Value::Null)
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .partial_cmp(&b.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        _ => Ordering::Equal,
    }
}

fn op_merge(config: &Value, base: &relay_expression::EvaluationContext) -> Result<Value, RelayError> {
    let inputs = config
        .get("inputs")
        .and_then(Value::as_array)
        .ok_or_else(|| RelayError::validation("merge requires an 'inputs' array of accessor paths"))?;

    let mut merged_object = Map::new();
    let mut merged_array = Vec::new();
    let mut saw_array = false;

    for path in inputs {
        let path = path
            .as_str()
            .ok_or_else(|| RelayError::validation("merge 'inputs' entries must be strings"))?;
        match evaluate(path, base)? {
            Value::Object(obj) => merged_object.extend(obj),
            Value::Array(arr) => {
                saw_array = true;
                merged_array.extend(arr);
            }
            other => merged_array.push(other),
        }
    }

    Ok(if saw_array { Value::Array(merged_array) } else { Value::Object(merged_object) })
}

fn op_filter(config: &Value, base: &relay_expression::EvaluationContext) -> Result<Value, RelayError> {
    let input = resolve_input(config, "input", base)?;
    let condition = config
        .get("condition")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::validation("filter requires a 'condition'"))?;
    let Value::Array(items) = input else {
        return Err(RelayError::validation("filter requires an array input"));
    };

    let mut kept = Vec::new();
    for item in items {
        let mut item_ctx = base.clone();
        item_ctx.set_execution_var("item", item.clone());
        if is_truthy(&evaluate(condition, &item_ctx)?) {
            kept.push(item);
        }
    }
    Ok(Value::Array(kept))
}

fn op_sort(config: &Value, base: &relay_expression::EvaluationContext) -> Result<Value, RelayError> {
    let input = resolve_input(config, "input", base)?;
    let Value::Array(mut items) = input else {
        return Err(RelayError::validation("sort requires an array input"));
    };
    let by = config.get("by").and_then(Value::as_str);
    let descending = config.get("order").and_then(Value::as_str) == Some("desc");

    items.sort_by(|a, b| {
        let (a, b) = match by {
            Some(field) => (field_of(a, field), field_of(b, field)),
            None => (a.clone(), b.clone()),
        };
        let ord = compare_values(&a, &b);
        if descending { ord.reverse() } else { ord }
    });
    Ok(Value::Array(items))
}

fn op_group(config: &Value, base: &relay_expression::EvaluationContext) -> Result<Value, RelayError> {
    let input = resolve_input(config, "input", base)?;
    let Value::Array(items) = input else {
        return Err(RelayError::validation("group requires an array input"));
    };
    let by = config
        .get("by")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::validation("group requires a 'by' field name"))?;

    let mut groups: HashMap<String, Vec<Value>> = HashMap::new();
    for item in items {
        let key = field_of(&item, by);
        let key = key.as_str().map_or_else(|| key.to_string(), str::to_string);
        groups.entry(key).or_default().push(item);
    }
    let object = groups.into_iter().map(|(k, v)| (k, Value::Array(v))).collect();
    Ok(Value::Object(object))
}

fn op_unique(config: &Value, base: &relay_expression::EvaluationContext) -> Result<Value, RelayError> {
    let input = resolve_input(config, "input", base)?;
    let Value::Array(items) = input else {
        return Err(RelayError::validation("unique requires an array input"));
    };
    let by = config.get("by").and_then(Value::as_str);

    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for item in items {
        let key = match by {
            Some(field) => field_of(&item, field).to_string(),
            None => item.to_string(),
        };
        if seen.insert(key) {
            out.push(item);
        }
    }
    Ok(Value::Array(out))
}

fn op_format(config: &Value, base: &relay_expression::EvaluationContext) -> Result<Value, RelayError> {
    let template = config
        .get("template")
        .and_then(Value::as_str)
        .ok_or_else(|| RelayError::validation("format requires a 'template'"))?;
    Ok(Value::String(TemplateEngine::new().render(template, base)))
}

pub struct UtilityAdapter;

#[async_trait]
impl ConnectorAdapter for UtilityAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let base = build_context(prev_results, ctx);
        let config = &node.config;
        let op = config
            .get("op")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("utility node requires an 'op'"))?;

        match op {
            "merge" => op_merge(config, &base),
            "filter" => op_filter(config, &base),
            "sort" => op_sort(config, &base),
            "group" => op_group(config, &base),
            "unique" => op_unique(config, &base),
            "format" => op_format(config, &base),
            other => Err(RelayError::validation(format!(
                "unknown utility op '{other}', expected merge|filter|sort|group|unique|format"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{ExecutionId, WorkflowId};
    use relay_workflow::NodeType;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    fn node(config: Value) -> NodeDefinition {
        NodeDefinition::new(NodeId::from("n1"), NodeType::Connector("utility".into())).with_config(config)
    }

    #[tokio::test]
    async fn sort_orders_by_field_descending() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("rows"), json!([{"n": 1}, {"n": 3}, {"n": 2}]));

        let result = UtilityAdapter
            .execute(
                &node(json!({"op": "sort", "input": "node.rows", "by": "n", "order": "desc"})),
                &prev,
                &ctx(),
            )
            .await
            .unwrap();
        assert_eq!(result, json!([{"n": 3}, {"n": 2}, {"n": 1}]));
    }

    #[tokio::test]
    async fn group_buckets_by_field() {
        let mut prev = HashMap::new();
        prev.insert(
            NodeId::from("rows"),
            json!([{"team": "a", "n": 1}, {"team": "b", "n": 2}, {"team": "a", "n": 3}]),
        );

        let result = UtilityAdapter
            .execute(&node(json!({"op": "group", "input": "node.rows", "by": "team"})), &prev, &ctx())
            .await
            .unwrap();
        assert_eq!(result["a"], json!([{"team": "a", "n": 1}, {"team": "a", "n": 3}]));
        assert_eq!(result["b"], json!([{"team": "b", "n": 2}]));
    }

    #[tokio::test]
    async fn unique_dedupes_by_field() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("rows"), json!([{"id": 1}, {"id": 1}, {"id": 2}]));

        let result = UtilityAdapter
            .execute(&node(json!({"op": "unique", "input": "node.rows", "by": "id"})), &prev, &ctx())
            .await
            .unwrap();
        assert_eq!(result, json!([{"id": 1}, {"id": 2}]));
    }

    #[tokio::test]
    async fn unknown_op_is_a_validation_error() {
        let err = UtilityAdapter
            .execute(&node(json!({"op": "bogus"})), &HashMap::new(), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }
}
