//! `file-process` and `email` connectors (§4.4): side-effect-free
//! placeholders that shape a plausible result without touching a
//! filesystem or mail transport. Real implementations are expected to be
//! registered over these by embedders; these stand in so a workflow that
//! references either type is still executable out of the box.

use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_expression::TemplateEngine;
use relay_workflow::NodeDefinition;
use serde_json::{json, Value};

use crate::adapter::ConnectorAdapter;
use crate::eval_ctx::build_context;

pub struct FileProcessStub;

#[async_trait]
impl ConnectorAdapter for FileProcessStub {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let config = &node.config;
        let template_engine = TemplateEngine::new();
        let eval_ctx = build_context(prev_results, ctx);

        let path = config
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("file-process node requires a 'path'"))?;
        let operation = config.get("operation").and_then(Value::as_str).unwrap_or("read");

        Ok(json!({
            "stub": true,
            "operation": operation,
            "path": template_engine.render(path, &eval_ctx),
            "bytesProcessed": 0,
        }))
    }
}

pub struct EmailStub;

#[async_trait]
impl ConnectorAdapter for EmailStub {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let config = &node.config;
        let template_engine = TemplateEngine::new();
        let eval_ctx = build_context(prev_results, ctx);

        let to = config
            .get("to")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("email node requires a 'to' address"))?;
        let subject = config.get("subject").and_then(Value::as_str).unwrap_or("");

        Ok(json!({
            "stub": true,
            "sent": false,
            "to": template_engine.render(to, &eval_ctx),
            "subject": template_engine.render(subject, &eval_ctx),
        }))
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

    fn node(connector: &str, config: Value) -> NodeDefinition {
        NodeDefinition::new(NodeId::from("n1"), NodeType::Connector(connector.into())).with_config(config)
    }

    #[tokio::test]
    async fn file_process_stub_never_touches_a_real_file() {
        let result = FileProcessStub
            .execute(&node("file-process", json!({"path": "/tmp/x.csv", "operation": "write"})), &HashMap::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(result["stub"], json!(true));
        assert_eq!(result["bytesProcessed"], json!(0));
    }

    #[tokio::test]
    async fn email_stub_reports_unsent() {
        let result = EmailStub
            .execute(&node("email", json!({"to": "a@example.com", "subject": "hi"})), &HashMap::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(result["sent"], json!(false));
        assert_eq!(result["to"], json!("a@example.com"));
    }

    #[tokio::test]
    async fn email_stub_requires_a_recipient() {
        let err = EmailStub.execute(&node("email", json!({})), &HashMap::new(), &ctx()).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }
}
