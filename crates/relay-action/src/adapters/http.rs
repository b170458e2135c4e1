//! `http-request` (§4.3): interpolates url/headers/body against the
//! per-node evaluation context and performs the call through [`HttpPort`],
//! or returns a planned-request placeholder when `ctx.is_dry_run`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_expression::TemplateEngine;
use relay_workflow::NodeDefinition;
use serde_json::{json, Value};

use crate::adapter::ConnectorAdapter;
use crate::eval_ctx::build_context;
use crate::ports::{HttpPort, HttpRequestSpec};

const DEFAULT_TIMEOUT_MS: u64 = 30_000;

pub struct HttpRequestAdapter {
    port: Arc<dyn HttpPort>,
}

impl HttpRequestAdapter {
    #[must_use]
    pub fn new(port: Arc<dyn HttpPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl ConnectorAdapter for HttpRequestAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let config = &node.config;
        let template_engine = TemplateEngine::new();
        let eval_ctx = build_context(prev_results, ctx);

        let method = config
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or("GET")
            .to_uppercase();

        let url_template = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("http-request node requires a url"))?;
        let url = template_engine.render(url_template, &eval_ctx);

        let headers: HashMap<String, String> = config
            .get("headers")
            .and_then(Value::as_object)
            .map(|map| {
                map.iter()
                    .map(|(k, v)| {
                        let rendered = v.as_str().map_or_else(|| v.to_string(), |s| template_engine.render(s, &eval_ctx));
                        (k.clone(), rendered)
                    })
                    .collect()
            })
            .unwrap_or_default();

        let body = config.get("body").map(|b| template_engine.render_value(b, &eval_ctx));

        let timeout_ms = config.get("timeoutMs").and_then(Value::as_u64).unwrap_or(DEFAULT_TIMEOUT_MS);

        if ctx.is_dry_run {
            return Ok(json!({
                "dryRun": true,
                "method": method,
                "url": url,
                "headers": headers,
                "body": body,
            }));
        }

        let response = self
            .port
            .request(HttpRequestSpec {
                method,
                url,
                headers,
                body,
                timeout: Duration::from_millis(timeout_ms),
            })
            .await?;

        Ok(json!({
            "status": response.status,
            "headers": response.headers,
            "data": response.body,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{HttpResponseSpec, MockHttpPort};
    use relay_core::{ExecutionId, WorkflowId};
    use relay_workflow::NodeType;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    fn node(config: Value) -> NodeDefinition {
        NodeDefinition::new(NodeId::from("n1"), NodeType::HttpRequest).with_config(config)
    }

    #[tokio::test]
    async fn dry_run_returns_planned_request_without_calling_the_port() {
        let port = Arc::new(MockHttpPort::new());
        let adapter = HttpRequestAdapter::new(port.clone());
        let dry_ctx = ctx().dry_run();

        let result = adapter
            .execute(&node(json!({"method": "POST", "url": "https://example.com/x"})), &HashMap::new(), &dry_ctx)
            .await
            .unwrap();

        assert_eq!(result["dryRun"], json!(true));
        assert_eq!(result["url"], json!("https://example.com/x"));
        assert!(port.requests().is_empty());
    }

    #[tokio::test]
    async fn live_run_interpolates_url_and_calls_the_port() {
        let port = Arc::new(MockHttpPort::new());
        port.queue_response(HttpResponseSpec {
            status: 200,
            headers: HashMap::new(),
            body: json!({"ok": true}),
        });
        let adapter = HttpRequestAdapter::new(port.clone());

        let mut prev = HashMap::new();
        prev.insert(NodeId::from("fetchId"), json!({"id": 42}));

        let result = adapter
            .execute(
                &node(json!({"method": "GET", "url": "https://example.com/users/{{node.fetchId.id}}"})),
                &prev,
                &ctx(),
            )
            .await
            .unwrap();

        assert_eq!(result["status"], json!(200));
        assert_eq!(port.requests()[0].url, "https://example.com/users/42");
    }

    #[tokio::test]
    async fn missing_url_is_a_validation_error() {
        let port = Arc::new(MockHttpPort::new());
        let adapter = HttpRequestAdapter::new(port);
        let err = adapter
            .execute(&node(json!({"method": "GET"})), &HashMap::new(), &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }
}
