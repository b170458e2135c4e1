//! `validation` connector (§4.4): checks an input value against a field
//! schema (`required`/`type`) and a list of rule expressions, reporting a
//! `{valid, errors}` record rather than failing the node — a validation
//! failure is data for downstream routing, not an execution error.

use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_expression::{evaluate, is_truthy};
use relay_workflow::NodeDefinition;
use serde_json::{json, Value};

use crate::adapter::ConnectorAdapter;
use crate::eval_ctx::build_context;

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn check_schema(input: &Value, schema: &Value, errors: &mut Vec<String>) {
    let Some(fields) = schema.as_object() else { return };
    let obj = input.as_object();

    for (field, rule) in fields {
        let present = obj.and_then(|o| o.get(field));
        let required = rule.get("required").and_then(Value::as_bool).unwrap_or(false);

        match present {
            None if required => errors.push(format!("missing required field '{field}'")),
            None => {}
            Some(value) => {
                if let Some(expected) = rule.get("type").and_then(Value::as_str) {
                    let actual = type_name(value);
                    if actual != expected {
                        errors.push(format!("field '{field}' expected type {expected}, got {actual}"));
                    }
                }
            }
        }
    }
}

pub struct ValidationAdapter;

#[async_trait]
impl ConnectorAdapter for ValidationAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let config = &node.config;
        let base = build_context(prev_results, ctx);

        let input = match config.get("input").and_then(Value::as_str) {
            Some(path) => evaluate(path, &base)?,
            None => Value::Null,
        };

        let mut errors = Vec::new();
        if let Some(schema) = config.get("schema") {
            check_schema(&input, schema, &mut errors);
        }

        if let Some(rules) = config.get("rules").and_then(Value::as_array) {
            for rule in rules {
                let expression = rule
                    .get("expression")
                    .and_then(Value::as_str)
                    .ok_or_else(|| RelayError::validation("validation rule requires an 'expression'"))?;
                let mut rule_ctx = base.clone();
                rule_ctx.set_execution_var("input", input.clone());
                if !is_truthy(&evaluate(expression, &rule_ctx)?) {
                    let message = rule
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or(expression)
                        .to_string();
                    errors.push(message);
                }
            }
        }

        Ok(json!({ "valid": errors.is_empty(), "errors": errors }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::{ExecutionId, WorkflowId};
    use relay_workflow::NodeType;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    fn node(config: Value) -> NodeDefinition {
        NodeDefinition::new(NodeId::from("n1"), NodeType::Connector("validation".into())).with_config(config)
    }

    #[tokio::test]
    async fn missing_required_field_is_reported() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("payload"), json!({"name": "a"}));

        let config = json!({
            "input": "node.payload",
            "schema": {"name": {"required": true, "type": "string"}, "age": {"required": true}}
        });

        let result = ValidationAdapter.execute(&node(config), &prev, &ctx()).await.unwrap();
        assert_eq!(result["valid"], json!(false));
        assert_eq!(result["errors"], json!(["missing required field 'age'"]));
    }

    #[tokio::test]
    async fn rule_expression_failure_uses_custom_message() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("payload"), json!({"age": 10}));

        let config = json!({
            "input": "node.payload",
            "rules": [{"expression": "input.age >= 18", "message": "must be an adult"}]
        });

        let result = ValidationAdapter.execute(&node(config), &prev, &ctx()).await.unwrap();
        assert_eq!(result["valid"], json!(false));
        assert_eq!(result["errors"], json!(["must be an adult"]));
    }

    #[tokio::test]
    async fn valid_input_reports_no_errors() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("payload"), json!({"name": "a", "age": 30}));

        let config = json!({
            "input": "node.payload",
            "schema": {"name": {"required": true}, "age": {"required": true}},
            "rules": [{"expression": "input.age >= 18"}]
        });

        let result = ValidationAdapter.execute(&node(config), &prev, &ctx()).await.unwrap();
        assert_eq!(result["valid"], json!(true));
        assert_eq!(result["errors"], json!([] as [String; 0]));
    }
}
