//! `condition` (§4.3): a connector-shaped alias of the `branch` guard —
//! evaluates a single boolean expression and reports which way it went
//! without itself performing the routing (routing is relay-engine's job;
//! this adapter only produces the verdict the engine routes on).

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

pub struct ConditionAdapter;

#[async_trait]
impl ConnectorAdapter for ConditionAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let condition = node
            .config
            .get("condition")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("condition node requires a 'condition' expression"))?;

        let eval_ctx = build_context(prev_results, ctx);
        let result = is_truthy(&evaluate(condition, &eval_ctx)?);
        Ok(json!({ "result": result }))
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
        NodeDefinition::new(NodeId::from("n1"), NodeType::Condition).with_config(config)
    }

    #[tokio::test]
    async fn truthy_condition_reports_true() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("check"), json!({"ok": true}));

        let result = ConditionAdapter
            .execute(&node(json!({"condition": "node.check.ok"})), &prev, &ctx())
            .await
            .unwrap();
        assert_eq!(result["result"], json!(true));
    }

    #[tokio::test]
    async fn missing_condition_is_a_validation_error() {
        let err = ConditionAdapter.execute(&node(json!({})), &HashMap::new(), &ctx()).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }
}
