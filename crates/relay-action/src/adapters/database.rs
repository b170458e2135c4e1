//! `database` connector (§4.4): routes `query`/`insert` operations through
//! the [`DataPort`] collaborator instead of a concrete driver.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_expression::TemplateEngine;
use relay_workflow::NodeDefinition;
use serde_json::{json, Value};

use crate::adapter::ConnectorAdapter;
use crate::eval_ctx::build_context;
use crate::ports::DataPort;

pub struct DatabaseAdapter {
    port: Arc<dyn DataPort>,
}

impl DatabaseAdapter {
    #[must_use]
    pub fn new(port: Arc<dyn DataPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl ConnectorAdapter for DatabaseAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let config = &node.config;
        let eval_ctx = build_context(prev_results, ctx);

        let collection = config
            .get("collection")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("database node requires a 'collection'"))?;
        let operation = config.get("operation").and_then(Value::as_str).unwrap_or("query");

        if ctx.is_dry_run {
            return Ok(json!({"dryRun": true, "operation": operation, "collection": collection}));
        }

        match operation {
            "query" => {
                let filter = config
                    .get("filter")
                    .map(|f| TemplateEngine::new().render_value(f, &eval_ctx))
                    .unwrap_or(Value::Null);
                let rows = self.port.query(collection, filter).await?;
                Ok(json!({ "rows": rows }))
            }
            "insert" => {
                let record = config
                    .get("record")
                    .map(|r| TemplateEngine::new().render_value(r, &eval_ctx))
                    .ok_or_else(|| RelayError::validation("database insert requires a 'record'"))?;
                self.port.insert(collection, record).await?;
                Ok(json!({ "inserted": true }))
            }
            other => Err(RelayError::validation(format!(
                "unknown database operation '{other}', expected query|insert"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::InMemoryDataPort;
    use relay_core::{ExecutionId, WorkflowId};
    use relay_workflow::NodeType;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    fn node(config: Value) -> NodeDefinition {
        NodeDefinition::new(NodeId::from("n1"), NodeType::Connector("database".into())).with_config(config)
    }

    #[tokio::test]
    async fn query_returns_seeded_rows() {
        let port = Arc::new(InMemoryDataPort::new().seed("users", vec![json!({"id": 1})]));
        let adapter = DatabaseAdapter::new(port);

        let result = adapter
            .execute(&node(json!({"collection": "users", "operation": "query"})), &HashMap::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(result["rows"], json!([{"id": 1}]));
    }

    #[tokio::test]
    async fn insert_persists_a_record() {
        let port = Arc::new(InMemoryDataPort::new());
        let adapter = DatabaseAdapter::new(port.clone());

        adapter
            .execute(
                &node(json!({"collection": "events", "operation": "insert", "record": {"kind": "created"}})),
                &HashMap::new(),
                &ctx(),
            )
            .await
            .unwrap();

        let rows = port.query("events", Value::Null).await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn dry_run_never_touches_the_port() {
        let port = Arc::new(InMemoryDataPort::new());
        let adapter = DatabaseAdapter::new(port.clone());

        let result = adapter
            .execute(
                &node(json!({"collection": "events", "operation": "insert", "record": {}})),
                &HashMap::new(),
                &ctx().dry_run(),
            )
            .await
            .unwrap();
        assert_eq!(result["dryRun"], json!(true));
        assert!(port.query("events", Value::Null).await.unwrap().is_empty());
    }
}
