//! `delay` (§4.3): sleeps for a fixed duration, or polls a condition
//! expression every 100ms until it is truthy or `maxWaitMs` elapses.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_expression::{evaluate, is_truthy};
use relay_workflow::NodeDefinition;
use serde_json::{json, Value};
use tokio::time::Instant;

use crate::adapter::ConnectorAdapter;
use crate::eval_ctx::build_context;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const DEFAULT_MAX_WAIT_MS: u64 = 30_000;

fn duration_from_config(config: &Value) -> Option<Duration> {
    let amount = config.get("duration").and_then(Value::as_u64)?;
    let unit = config.get("unit").and_then(Value::as_str).unwrap_or("ms");
    let ms = match unit {
        "ms" => amount,
        "s" | "seconds" => amount.saturating_mul(1000),
        "m" | "minutes" => amount.saturating_mul(60_000),
        _ => amount,
    };
    Some(Duration::from_millis(ms))
}

pub struct DelayAdapter;

#[async_trait]
impl ConnectorAdapter for DelayAdapter {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let config = &node.config;
        let max_wait = Duration::from_millis(config.get("maxWaitMs").and_then(Value::as_u64).unwrap_or(DEFAULT_MAX_WAIT_MS));

        if let Some(condition) = config.get("condition").and_then(Value::as_str) {
            if ctx.is_dry_run {
                return Ok(json!({"dryRun": true, "mode": "poll", "condition": condition, "maxWaitMs": max_wait.as_millis()}));
            }

            let deadline = Instant::now() + max_wait;
            loop {
                ctx.check_cancelled()?;
                let eval_ctx = build_context(prev_results, ctx);
                if is_truthy(&evaluate(condition, &eval_ctx)?) {
                    return Ok(json!({"satisfied": true, "waited": true}));
                }
                if Instant::now() >= deadline {
                    return Err(RelayError::validation(format!(
                        "delay condition '{condition}' was not satisfied within {}ms",
                        max_wait.as_millis()
                    )));
                }
                tokio::select! {
                    () = tokio::time::sleep(POLL_INTERVAL) => {}
                    () = ctx.cancellation_token().cancelled() => return Err(RelayError::cancelled(relay_error::CancelReason::UserCancelled)),
                }
            }
        }

        let sleep_for = duration_from_config(config)
            .ok_or_else(|| RelayError::validation("delay node requires a 'duration' when no 'condition' is set"))?
            .min(max_wait);

        if ctx.is_dry_run {
            return Ok(json!({"dryRun": true, "mode": "sleep", "durationMs": sleep_for.as_millis()}));
        }

        tokio::select! {
            () = tokio::time::sleep(sleep_for) => {}
            () = ctx.cancellation_token().cancelled() => return Err(RelayError::cancelled(relay_error::CancelReason::UserCancelled)),
        }
        Ok(json!({"waited": true, "durationMs": sleep_for.as_millis()}))
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
        NodeDefinition::new(NodeId::from("n1"), NodeType::Delay).with_config(config)
    }

    #[tokio::test]
    async fn dry_run_sleep_returns_plan_without_waiting() {
        let started = Instant::now();
        let result = DelayAdapter
            .execute(&node(json!({"duration": 10, "unit": "s"})), &HashMap::new(), &ctx().dry_run())
            .await
            .unwrap();
        assert_eq!(result["dryRun"], json!(true));
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn live_sleep_waits_the_requested_duration() {
        let started = Instant::now();
        let result = DelayAdapter
            .execute(&node(json!({"duration": 50, "unit": "ms"})), &HashMap::new(), &ctx())
            .await
            .unwrap();
        assert_eq!(result["waited"], json!(true));
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn poll_condition_returns_once_satisfied() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("flag"), json!({"ready": true}));

        let result = DelayAdapter
            .execute(&node(json!({"condition": "node.flag.ready", "maxWaitMs": 500})), &prev, &ctx())
            .await
            .unwrap();
        assert_eq!(result["satisfied"], json!(true));
    }

    #[tokio::test]
    async fn poll_condition_times_out() {
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("flag"), json!({"ready": false}));

        let err = DelayAdapter
            .execute(&node(json!({"condition": "node.flag.ready", "maxWaitMs": 150})), &prev, &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }

    #[tokio::test]
    async fn missing_duration_and_condition_is_a_validation_error() {
        let err = DelayAdapter.execute(&node(json!({})), &HashMap::new(), &ctx()).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }
}
