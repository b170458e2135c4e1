//! The node dispatcher (C5, §4.3): routes a single node definition to the
//! adapter or control-flow handler for its type, and runs anything the
//! node's config needs evaluated (conditions, templated values) against the
//! shared expression evaluator.
//!
//! Grounded on `crates/action/src/dispatch.rs`'s per-node-type match arm,
//! adapted here to the control-flow node types (`branch`, `loop`, `retry`,
//! `subworkflow`) which this crate owns rather than an adapter.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use relay_action::adapters::{ConditionAdapter, DelayAdapter, HttpRequestAdapter, TransformAdapter};
use relay_action::{build_context, ConnectorAdapter, ConnectorRegistry, HttpPort};
use relay_config::EngineConfig;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_eventbus::{EventBus, EventKind};
use relay_execution::{ExecutionContext, LogLevel, NodeState};
use relay_expression::{evaluate, is_truthy, TemplateEngine};
use relay_resilience::{run_with_retry, RetryPolicy};
use relay_workflow::{NodeDefinition, NodeType, VariableScope, WorkflowDefinition};
use serde_json::{json, Value};
use std::time::Duration;

use crate::persistence::PersistencePort;
use crate::scheduler::merge_exit_outputs;

pub const DEFAULT_MAX_LOOP_ITERATIONS: u64 = 1000;
pub const DEFAULT_SUBWORKFLOW_DEPTH_LIMIT: u32 = 5;

fn config_str<'a>(config: &'a Value, key: &str) -> Option<&'a str> {
    config.get(key).and_then(Value::as_str)
}

/// A `render_value_with` callback that logs a failed `${expr}` hole at warn
/// (§4.2) instead of letting it disappear into the rendered fallback.
fn warn_on_failed_hole<'a>(ctx: &'a ExecutionContext, node_id: &'a NodeId) -> impl FnMut(&str) + 'a {
    move |expr_src: &str| {
        ctx.add_log(
            LogLevel::Warn,
            format!("template hole '${{{expr_src}}}' failed to evaluate"),
            Some(node_id.clone()),
            None,
        );
    }
}

/// Routes a node to its adapter or control-flow handler (§4.3's node-type
/// table). `workflow_input` is the execution's original input, `merged_input`
/// is this node's 0/1/N-predecessor merge — only the pass-through
/// start/end/output types use either directly; everything else reaches into
/// `prev_results` by node id through an expression path.
pub struct NodeDispatcher {
    connectors: Arc<ConnectorRegistry>,
    http: HttpRequestAdapter,
    transform: TransformAdapter,
    condition: ConditionAdapter,
    delay: DelayAdapter,
    persistence: Arc<dyn PersistencePort>,
    events: Arc<EventBus>,
    config: EngineConfig,
}

impl NodeDispatcher {
    #[must_use]
    pub fn new(
        connectors: Arc<ConnectorRegistry>,
        http: Arc<dyn HttpPort>,
        persistence: Arc<dyn PersistencePort>,
        events: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            connectors,
            http: HttpRequestAdapter::new(http),
            transform: TransformAdapter,
            condition: ConditionAdapter,
            delay: DelayAdapter,
            persistence,
            events,
            config,
        }
    }

    pub(crate) fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub async fn dispatch(
        &self,
        node: &NodeDefinition,
        workflow_input: &Value,
        merged_input: &Value,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        ctx.check_cancelled()?;

        match &node.node_type {
            NodeType::Start | NodeType::TriggerManual => Ok(workflow_input.clone()),
            NodeType::End | NodeType::Output => Ok(merged_input.clone()),
            NodeType::Expression => self.dispatch_expression(node, prev_results, ctx),
            NodeType::SetVariable => self.dispatch_set_variable(node, prev_results, ctx),
            NodeType::Transform => self.transform.execute(node, prev_results, ctx).await,
            NodeType::HttpRequest => self.http.execute(node, prev_results, ctx).await,
            NodeType::Delay => self.delay.execute(node, prev_results, ctx).await,
            NodeType::Condition => self.condition.execute(node, prev_results, ctx).await,
            NodeType::Branch => self.dispatch_branch(node, prev_results, ctx).await,
            NodeType::Loop => self.dispatch_loop(node, prev_results, ctx).await,
            NodeType::Retry => self.dispatch_retry(node, prev_results, ctx).await,
            NodeType::Subworkflow => self.dispatch_subworkflow(node, prev_results, ctx).await,
            NodeType::Connector(connector_type) => {
                self.connectors.execute(connector_type, node, prev_results, ctx).await
            }
        }
    }

    fn dispatch_expression(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let expr = config_str(&node.config, "expression")
            .ok_or_else(|| RelayError::validation("expression node requires config.expression"))?;
        evaluate(expr, &build_context(prev_results, ctx))
    }

    fn dispatch_set_variable(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let name = config_str(&node.config, "name")
            .ok_or_else(|| RelayError::validation("setVariable node requires config.name"))?;
        let scope = match config_str(&node.config, "scope") {
            Some("global") => VariableScope::Global,
            _ => VariableScope::Local,
        };
        let ty = config_str(&node.config, "type").unwrap_or("json");
        let eval_ctx = build_context(prev_results, ctx);
        let rendered = node
            .config
            .get("value")
            .map(|v| TemplateEngine::new().render_value_with(v, &eval_ctx, &mut warn_on_failed_hole(ctx, &node.id)))
            .unwrap_or(Value::Null);
        let coerced = coerce(rendered, ty)?;
        ctx.set_variable(name, coerced.clone(), scope);
        Ok(coerced)
    }

    async fn dispatch_branch(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let condition = node
            .config
            .get("condition")
            .ok_or_else(|| RelayError::validation("branch node requires config.condition"))?;
        let condition_str = condition
            .as_str()
            .ok_or_else(|| RelayError::validation("branch node's condition must be a string expression"))?;
        let branch_taken = is_truthy(&evaluate(condition_str, &build_context(prev_results, ctx))?);

        let key = if branch_taken { "trueBranch" } else { "falseBranch" };
        let Some(spec) = node.config.get(key) else {
            return Ok(json!({"branchTaken": branch_taken, "result": Value::Null}));
        };
        let result = self.execute_action_spec(spec, prev_results, ctx).await?;
        Ok(json!({"branchTaken": branch_taken, "result": result}))
    }

    async fn dispatch_loop(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let loop_type = config_str(&node.config, "loopType")
            .ok_or_else(|| RelayError::validation("loop node requires config.loopType"))?;
        let condition = node
            .config
            .get("condition")
            .ok_or_else(|| RelayError::validation("loop node requires config.condition"))?
            .as_str()
            .ok_or_else(|| RelayError::validation("loop node's condition must be a string expression"))?;
        let body = node
            .config
            .get("loopBody")
            .ok_or_else(|| RelayError::validation("loop node requires config.loopBody"))?;
        let max_iterations = node
            .config
            .get("maxIterations")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.loop_max_iterations);

        let mut results = Vec::new();

        match loop_type {
            "forEach" => {
                let items = evaluate(condition, &build_context(prev_results, ctx))?;
                let Value::Array(items) = items else {
                    return Err(RelayError::validation("forEach loop's condition must evaluate to an array"));
                };
                if items.len() as u64 > max_iterations {
                    return Err(RelayError::loop_limit_exceeded(max_iterations));
                }
                for (index, item) in items.into_iter().enumerate() {
                    ctx.check_cancelled()?;
                    ctx.set_variable("loopItem", item, VariableScope::Local);
                    ctx.set_variable("loopIndex", json!(index), VariableScope::Local);
                    results.push(self.execute_action_spec(body, prev_results, ctx).await?);
                }
            }
            "while" => {
                let mut iteration: u64 = 0;
                loop {
                    ctx.check_cancelled()?;
                    ctx.set_variable("loopIndex", json!(iteration), VariableScope::Local);
                    if !is_truthy(&evaluate(condition, &build_context(prev_results, ctx))?) {
                        break;
                    }
                    if iteration >= max_iterations {
                        return Err(RelayError::loop_limit_exceeded(max_iterations));
                    }
                    results.push(self.execute_action_spec(body, prev_results, ctx).await?);
                    iteration += 1;
                }
            }
            other => {
                return Err(RelayError::validation(format!("unknown loopType '{other}'")));
            }
        }

        Ok(Value::Array(results))
    }

    async fn dispatch_retry(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let action = node
            .config
            .get("action")
            .ok_or_else(|| RelayError::validation("retry node requires config.action"))?;
        let max_attempts = node
            .config
            .get("maxAttempts")
            .and_then(Value::as_u64)
            .map_or(self.config.retry_max_attempts, |n| n as u32);
        let initial_delay_ms = node
            .config
            .get("initialDelayMs")
            .and_then(Value::as_u64)
            .unwrap_or(self.config.retry_initial_delay_ms);
        let backoff_multiplier = node
            .config
            .get("backoffMultiplier")
            .and_then(Value::as_f64)
            .unwrap_or(self.config.retry_backoff_multiplier);
        let policy = RetryPolicy::new(max_attempts, Duration::from_millis(initial_delay_ms), backoff_multiplier);

        // `run_with_retry` owns the whole attempt/backoff loop, so the only
        // way to observe a retryable failure as it happens (rather than
        // after the fact from `RetryStats`) is from inside the closure it
        // calls: mark the node `Retrying` the moment an attempt fails and
        // is going to be retried, then back to `Running` before the next
        // attempt runs.
        let attempt = AtomicU32::new(0);
        let (value, _stats) = run_with_retry(&policy, &ctx.cancellation_token(), || {
            if attempt.load(Ordering::SeqCst) > 0 {
                let _ = ctx.set_node_state(node.id.clone(), NodeState::Running);
            }
            let this_attempt = attempt.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                let result = self.execute_action_spec(action, prev_results, ctx).await;
                if let Err(ref err) = result {
                    if err.is_retryable() {
                        let _ = ctx.set_node_state(node.id.clone(), NodeState::Retrying);
                        self.events.publish(
                            ctx.execution_id,
                            EventKind::NodeRetrying,
                            Some(node.id.clone()),
                            Some(json!({"attempt": this_attempt})),
                        );
                    }
                }
                result
            }
        })
        .await?;
        Ok(value)
    }

    async fn dispatch_subworkflow(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let workflow_id_str = config_str(&node.config, "workflowId")
            .ok_or_else(|| RelayError::validation("subworkflow node requires config.workflowId"))?;
        let workflow_id = relay_core::WorkflowId::parse(workflow_id_str)
            .map_err(|e| RelayError::validation(format!("invalid workflowId: {e}")))?;

        if ctx.subworkflow_depth >= self.config.subworkflow_depth_limit {
            return Err(RelayError::subworkflow_depth_exceeded(self.config.subworkflow_depth_limit));
        }

        let definition = self.persistence.load_workflow(workflow_id).await?;

        let input = match node.config.get("inputMapping") {
            Some(mapping) => TemplateEngine::new().render_value_with(
                mapping,
                &build_context(prev_results, ctx),
                &mut warn_on_failed_hole(ctx, &node.id),
            ),
            None => Value::Null,
        };

        let child_ctx = ctx.spawn_subworkflow(relay_core::ExecutionId::v4(), workflow_id);
        let node_results = crate::scheduler::run_workflow(
            &definition,
            &child_ctx,
            &input,
            self,
            self.config.max_parallel_branches,
        )
        .await
        .map_err(|(_, err)| err)?;

        Ok(merge_exit_outputs(&definition, &node_results))
    }

    /// Normalizes the three shapes an action spec may take (§4.3): a string
    /// is evaluated directly as an expression, an object is treated as a
    /// single-node set, an array is parsed into a node set and run through
    /// the scheduler like a subworkflow's body.
    async fn execute_action_spec(
        &self,
        spec: &Value,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        match spec {
            Value::String(expr) => evaluate(expr, &build_context(prev_results, ctx)),
            Value::Object(_) => {
                let nodes: Vec<NodeDefinition> = vec![serde_json::from_value(spec.clone())
                    .map_err(|e| RelayError::validation(format!("invalid action node: {e}")))?];
                self.run_node_set(&nodes, prev_results, ctx).await
            }
            Value::Array(items) => {
                let nodes: Vec<NodeDefinition> = items
                    .iter()
                    .map(|v| serde_json::from_value(v.clone()))
                    .collect::<Result<_, _>>()
                    .map_err(|e| RelayError::validation(format!("invalid action node set: {e}")))?;
                self.run_node_set(&nodes, prev_results, ctx).await
            }
            other => Err(RelayError::validation(format!("unsupported action spec shape: {other}"))),
        }
    }

    async fn run_node_set(
        &self,
        nodes: &[NodeDefinition],
        _prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let def = WorkflowDefinition {
            nodes: nodes.to_vec(),
            ..WorkflowDefinition::new(relay_core::WorkflowId::v4(), "nested")
        };
        let node_results = crate::scheduler::run_workflow(
            &def,
            ctx,
            &Value::Null,
            self,
            self.config.max_parallel_branches,
        )
        .await
        .map_err(|(_, err)| err)?;
        Ok(merge_exit_outputs(&def, &node_results))
    }
}

fn coerce(value: Value, ty: &str) -> Result<Value, RelayError> {
    match ty {
        "string" => Ok(match value {
            Value::String(s) => Value::String(s),
            other => Value::String(other.to_string()),
        }),
        "number" => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| RelayError::validation(format!("cannot coerce '{s}' to a number"))),
            other => Err(RelayError::validation(format!("cannot coerce {other} to a number"))),
        },
        "boolean" => Ok(Value::Bool(is_truthy(&value))),
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use relay_action::{ConnectorRegistry, MockHttpPort};
    use relay_core::{ExecutionId, WorkflowId};
    use serde_json::json;

    use super::*;
    use crate::persistence::InMemoryPersistence;

    fn dispatcher() -> NodeDispatcher {
        NodeDispatcher::new(
            Arc::new(ConnectorRegistry::new()),
            Arc::new(MockHttpPort::new()),
            Arc::new(InMemoryPersistence::new()),
            Arc::new(EventBus::new()),
            EngineConfig::default(),
        )
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    #[tokio::test]
    async fn expression_node_evaluates_against_prior_results() {
        let d = dispatcher();
        let ctx = ctx();
        let mut prev = HashMap::new();
        prev.insert(NodeId::from("a"), json!(2));
        let node = NodeDefinition::new("expr", NodeType::Expression).with_config(json!({"expression": "node.a + 3"}));
        let result = d.dispatch(&node, &Value::Null, &Value::Null, &prev, &ctx).await.unwrap();
        assert_eq!(result, json!(5));
    }

    #[tokio::test]
    async fn set_variable_coerces_number_from_string() {
        let d = dispatcher();
        let ctx = ctx();
        let node = NodeDefinition::new("setv", NodeType::SetVariable)
            .with_config(json!({"name": "n", "value": "42", "type": "number"}));
        let result = d.dispatch(&node, &Value::Null, &Value::Null, &HashMap::new(), &ctx).await.unwrap();
        assert_eq!(result, json!(42.0));
        assert_eq!(ctx.get_variable("n", None), Some(json!(42.0)));
    }

    #[tokio::test]
    async fn branch_runs_the_taken_side_and_reports_which_one() {
        let d = dispatcher();
        let ctx = ctx();
        let node = NodeDefinition::new("b", NodeType::Branch).with_config(json!({
            "condition": "true",
            "trueBranch": "1 + 1",
            "falseBranch": "99",
        }));
        let result = d.dispatch(&node, &Value::Null, &Value::Null, &HashMap::new(), &ctx).await.unwrap();
        assert_eq!(result["branchTaken"], json!(true));
        assert_eq!(result["result"], json!(2));
    }

    #[tokio::test]
    async fn for_each_loop_binds_loop_item_and_index() {
        let d = dispatcher();
        let ctx = ctx();
        let node = NodeDefinition::new("l", NodeType::Loop).with_config(json!({
            "loopType": "forEach",
            "condition": "[10, 20, 30]",
            "loopBody": "loopItem + loopIndex",
        }));
        let result = d.dispatch(&node, &Value::Null, &Value::Null, &HashMap::new(), &ctx).await.unwrap();
        assert_eq!(result, json!([10, 21, 32]));
    }

    #[tokio::test]
    async fn for_each_loop_over_limit_is_rejected() {
        let d = dispatcher();
        let ctx = ctx();
        let items: Vec<i32> = (0..5).collect();
        let node = NodeDefinition::new("l", NodeType::Loop).with_config(json!({
            "loopType": "forEach",
            "condition": format!("{:?}", items),
            "loopBody": "loopItem",
            "maxIterations": 2,
        }));
        let err = d.dispatch(&node, &Value::Null, &Value::Null, &HashMap::new(), &ctx).await.unwrap_err();
        assert!(matches!(err, RelayError::LoopLimitExceeded { max_iterations: 2 }));
    }

    #[tokio::test]
    async fn subworkflow_depth_limit_is_enforced() {
        let d = dispatcher();
        let mut ctx = ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4());
        for _ in 0..DEFAULT_SUBWORKFLOW_DEPTH_LIMIT {
            ctx = ctx.spawn_subworkflow(ExecutionId::v4(), ctx.workflow_id);
        }
        let node = NodeDefinition::new("sw", NodeType::Subworkflow)
            .with_config(json!({"workflowId": WorkflowId::v4().to_string()}));
        let err = d.dispatch(&node, &Value::Null, &Value::Null, &HashMap::new(), &ctx).await.unwrap_err();
        assert!(matches!(err, RelayError::SubworkflowDepthExceeded { .. }));
    }
}
