//! `webhook` connector (§4.4): posts a rendered payload to a configured
//! URL. Thin wrapper over [`HttpPort`], fixed to `POST`, distinct from
//! `http-request` only in its narrower config surface.

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

const DEFAULT_TIMEOUT_MS: u64 = 10_000;

pub struct WebhookAdapter {
    port: Arc<dyn HttpPort>,
}

impl WebhookAdapter {
    #[must_use]
    pub fn new(port: Arc<dyn HttpPort>) -> Self {
        Self { port }
    }
}

#[async_trait]
impl ConnectorAdapter for WebhookAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let config = &node.config;
        let template_engine = TemplateEngine::new();
        let eval_ctx = build_context(prev_results, ctx);

        let url_template = config
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| RelayError::validation("webhook node requires a 'url'"))?;
        let url = template_engine.render(url_template, &eval_ctx);

        let payload = config.get("payload").map(|p| template_engine.render_value(p, &eval_ctx));

        if ctx.is_dry_run {
            return Ok(json!({"dryRun": true, "url": url, "payload": payload}));
        }

        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());

        let response = self
            .port
            .request(HttpRequestSpec {
                method: "POST".to_string(),
                url,
                headers,
                body: payload,
                timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            })
            .await?;

        Ok(json!({ "status": response.status, "data": response.body }))
    }
}
