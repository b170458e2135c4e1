//! The wave scheduler (C6, §4.5): a dynamic ready/in-flight set driven by
//! [`DependencyGraph::ready`], rather than a precomputed static level plan —
//! `branch`/`loop`/`retry` nodes can change which successors actually run,
//! which a level plan computed ahead of time cannot express.
//!
//! Grounded on `crates/engine/src/engine.rs`'s wave execution (there: a
//! `JoinSet` of node tasks gated by a `Semaphore`, reading/writing a shared
//! `DashMap<NodeId, Value>`). Node dispatch here can recurse into this same
//! scheduler (`branch`/`loop`/`retry`/`subworkflow` run nested node sets
//! through the dispatcher), so node futures are boxed into a
//! [`futures::stream::FuturesUnordered`] instead of spawned onto the
//! runtime: spawning would require `Arc`-wrapping the context and
//! dispatcher as `'static`, while boxing lets them stay plain borrows and —
//! as a side effect — breaks the otherwise-infinite recursive future type
//! that `dispatch -> branch/loop/retry -> run_workflow -> dispatch` would
//! produce if left unboxed.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use relay_core::NodeId;
use relay_error::{CancelReason, RelayError};
use relay_eventbus::EventKind;
use relay_execution::{ExecutionContext, NodeState};
use relay_workflow::{DependencyGraph, NodeDefinition, WorkflowDefinition};
use serde_json::Value;

use crate::dispatcher::NodeDispatcher;

pub const DEFAULT_PARALLELISM_CAP: usize = 10;

type NodeFuture<'a> = Pin<Box<dyn Future<Output = CompletedNode> + Send + 'a>>;

struct CompletedNode {
    node_id: NodeId,
    outcome: Result<Value, RelayError>,
}

/// The 0/1/N-predecessor merge rule (grounded on the teacher's
/// `resolve_node_input`): no predecessors gets the workflow input, one
/// predecessor passes its output straight through, several are merged into
/// an object keyed by predecessor id. Used only by the pure pass-through
/// `end`/`output` node types — every other type addresses prior results by
/// path through the full `prev_results` map instead.
fn merged_input(predecessors: &[NodeId], prev_results: &HashMap<NodeId, Value>, workflow_input: &Value) -> Value {
    match predecessors {
        [] => workflow_input.clone(),
        [only] => prev_results.get(only).cloned().unwrap_or(Value::Null),
        many => {
            let mut obj = serde_json::Map::new();
            for id in many {
                if let Some(v) = prev_results.get(id) {
                    obj.insert(id.to_string(), v.clone());
                }
            }
            Value::Object(obj)
        }
    }
}

/// Merges a nested node set's exit-node outputs using the same convention,
/// for `branch`/`loop`/`retry` action specs and `subworkflow` results.
pub(crate) fn merge_exit_outputs(def: &WorkflowDefinition, node_results: &HashMap<NodeId, Value>) -> Value {
    let Ok(graph) = DependencyGraph::from_definition(def) else {
        return Value::Null;
    };
    let exits = graph.exit_nodes();
    match exits.as_slice() {
        [] => Value::Null,
        [only] => node_results.get(only).cloned().unwrap_or(Value::Null),
        many => {
            let mut obj = serde_json::Map::new();
            for id in many {
                if let Some(v) = node_results.get(id) {
                    obj.insert(id.to_string(), v.clone());
                }
            }
            Value::Object(obj)
        }
    }
}

fn reverse_edges(def: &WorkflowDefinition) -> HashMap<NodeId, Vec<NodeId>> {
    let mut predecessors: HashMap<NodeId, Vec<NodeId>> = def.nodes.iter().map(|n| (n.id.clone(), Vec::new())).collect();
    for node in &def.nodes {
        for target in &node.connections {
            predecessors.entry(target.clone()).or_default().push(node.id.clone());
        }
    }
    predecessors
}

/// Runs `def` to completion against `ctx`, honoring cancellation and the
/// configured parallelism cap. Returns every node's result on success, or
/// the first failing node's id and error — `branch`'s `falseBranch` and
/// `retry`'s backoff loop are the only things that absorb a node failure;
/// everywhere else it cancels and fails the whole run (§4.5, §7).
pub async fn run_workflow<'a>(
    def: &'a WorkflowDefinition,
    ctx: &'a ExecutionContext,
    workflow_input: &Value,
    dispatcher: &'a NodeDispatcher,
    parallelism_cap: usize,
) -> Result<HashMap<NodeId, Value>, (NodeId, RelayError)> {
    let fallback_node = || def.nodes.first().map(|n| n.id.clone()).unwrap_or_else(|| NodeId::from("<workflow>"));

    let graph = DependencyGraph::from_definition(def).map_err(|e| (fallback_node(), e))?;
    let node_map: HashMap<NodeId, &NodeDefinition> = def.nodes.iter().map(|n| (n.id.clone(), n)).collect();
    let predecessors = reverse_edges(def);

    let cap = parallelism_cap.max(1);
    let mut completed: HashSet<NodeId> = HashSet::new();
    let mut in_flight: HashSet<NodeId> = HashSet::new();
    let mut node_results: HashMap<NodeId, Value> = HashMap::new();
    let mut pending: FuturesUnordered<NodeFuture<'a>> = FuturesUnordered::new();

    loop {
        if let Err(e) = ctx.check_cancelled() {
            while pending.next().await.is_some() {}
            return Err((fallback_node(), e));
        }

        let ready: Vec<NodeId> = graph
            .ready(&completed)
            .into_iter()
            .filter(|id| !in_flight.contains(id))
            .collect();

        let slots = cap.saturating_sub(in_flight.len());
        let mut dispatched_this_batch: u64 = 0;
        for node_id in ready.into_iter().take(slots) {
            let Some(&node_def) = node_map.get(&node_id) else { continue };
            in_flight.insert(node_id.clone());
            dispatched_this_batch += 1;
            let _ = ctx.set_node_state(node_id.clone(), NodeState::Running);
            dispatcher
                .events()
                .publish(ctx.execution_id, EventKind::NodeStarted, Some(node_id.clone()), None);

            let preds = predecessors.get(&node_id).cloned().unwrap_or_default();
            let merged = merged_input(&preds, &node_results, workflow_input);
            let prev_snapshot = node_results.clone();
            let workflow_input_owned = workflow_input.clone();
            let id_for_completion = node_id;

            let fut: NodeFuture<'a> = Box::pin(async move {
                let outcome = dispatcher
                    .dispatch(node_def, &workflow_input_owned, &merged, &prev_snapshot, ctx)
                    .await;
                CompletedNode { node_id: id_for_completion, outcome }
            });
            pending.push(fut);
        }

        // Recorded once per dispatch batch, sized to the paths newly opened
        // in that batch — not the running in-flight total, which would
        // double-count branches still in flight from an earlier tick
        // (spec.md's "number of new concurrent paths opened").
        if dispatched_this_batch > 1 {
            ctx.record_parallel_branches(dispatched_this_batch);
        }

        let Some(CompletedNode { node_id, outcome }) = pending.next().await else {
            break;
        };
        in_flight.remove(&node_id);

        match outcome {
            Ok(value) => {
                let _ = ctx.set_node_state(node_id.clone(), NodeState::Completed);
                dispatcher
                    .events()
                    .publish(ctx.execution_id, EventKind::NodeCompleted, Some(node_id.clone()), None);
                node_results.insert(node_id.clone(), value);
                completed.insert(node_id);
            }
            Err(err) => {
                let _ = ctx.set_node_state(node_id.clone(), NodeState::Failed);
                dispatcher.events().publish(
                    ctx.execution_id,
                    EventKind::NodeFailed,
                    Some(node_id.clone()),
                    Some(serde_json::json!({"error": err.to_public()})),
                );
                ctx.cancel(CancelReason::FatalNodeFailure);
                while pending.next().await.is_some() {}
                return Err((node_id, err));
            }
        }
    }

    Ok(node_results)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relay_action::{ConnectorRegistry, MockHttpPort};
    use relay_core::WorkflowId;
    use relay_workflow::{NodeDefinition, NodeType};
    use serde_json::json;

    use super::*;
    use crate::persistence::InMemoryPersistence;
    use relay_core::ExecutionId;

    fn dispatcher() -> NodeDispatcher {
        NodeDispatcher::new(
            Arc::new(ConnectorRegistry::new()),
            Arc::new(MockHttpPort::new()),
            Arc::new(InMemoryPersistence::new()),
            Arc::new(relay_eventbus::EventBus::new()),
            relay_config::EngineConfig::default(),
        )
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    #[tokio::test]
    async fn linear_chain_runs_in_order() {
        let def = WorkflowDefinition {
            nodes: vec![
                NodeDefinition::new("start", NodeType::Start).with_connections(vec!["set".into()]),
                NodeDefinition::new("set", NodeType::SetVariable)
                    .with_config(json!({"name": "greeting", "value": "hi"}))
                    .with_connections(vec!["end".into()]),
                NodeDefinition::new("end", NodeType::End),
            ],
            ..WorkflowDefinition::new(WorkflowId::v4(), "linear")
        };

        let ctx = ctx();
        let results = run_workflow(&def, &ctx, &json!({"x": 1}), &dispatcher(), DEFAULT_PARALLELISM_CAP)
            .await
            .unwrap();
        assert_eq!(results.get(&NodeId::from("end")), Some(&json!({"x": 1})));
        assert_eq!(ctx.get_variable("greeting", None), Some(json!("hi")));
    }

    #[tokio::test]
    async fn diamond_merges_both_branch_outputs_into_the_join() {
        let def = WorkflowDefinition {
            nodes: vec![
                NodeDefinition::new("start", NodeType::Start).with_connections(vec!["a".into(), "b".into()]),
                NodeDefinition::new("a", NodeType::Expression)
                    .with_config(json!({"expression": "1 + 1"}))
                    .with_connections(vec!["join".into()]),
                NodeDefinition::new("b", NodeType::Expression)
                    .with_config(json!({"expression": "2 + 2"}))
                    .with_connections(vec!["join".into()]),
                NodeDefinition::new("join", NodeType::End),
            ],
            ..WorkflowDefinition::new(WorkflowId::v4(), "diamond")
        };

        let ctx = ctx();
        let results = run_workflow(&def, &ctx, &Value::Null, &dispatcher(), DEFAULT_PARALLELISM_CAP)
            .await
            .unwrap();
        let join = results.get(&NodeId::from("join")).unwrap();
        assert_eq!(join["a"], json!(2));
        assert_eq!(join["b"], json!(4));
    }

    #[tokio::test]
    async fn failing_node_stops_the_run_and_cancels_the_context() {
        let def = WorkflowDefinition {
            nodes: vec![
                NodeDefinition::new("start", NodeType::Start).with_connections(vec!["bad".into()]),
                NodeDefinition::new("bad", NodeType::Expression).with_config(json!({"expression": "1 / 0"})),
            ],
            ..WorkflowDefinition::new(WorkflowId::v4(), "failing")
        };

        let ctx = ctx();
        let (failed_node, _err) = run_workflow(&def, &ctx, &Value::Null, &dispatcher(), DEFAULT_PARALLELISM_CAP)
            .await
            .unwrap_err();
        assert_eq!(failed_node, NodeId::from("bad"));
        assert!(ctx.is_cancelled());
    }
}
