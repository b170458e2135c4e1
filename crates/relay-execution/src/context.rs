//! The per-execution runtime context (§3 `ExecutionContext`, §4.6).
//!
//! Grounded on `execution/src/context.rs`'s shape: `Arc`-shared interior
//! state guarded by `parking_lot`, plus a `CancellationToken` for
//! cooperative cancellation. All mutations from concurrent node executions
//! serialize on their own lock per field, matching §5's "single mutex per
//! context" discipline applied at field granularity rather than one global
//! lock, since the teacher's own context already splits `node_outputs` and
//! `variables` into independent `RwLock`s.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use relay_core::{ExecutionId, NodeId, WorkflowId};
use relay_error::CancelReason;
use relay_workflow::VariableScope;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::counters::{Counters, CountersSnapshot};
use crate::log::{LogEntry, LogLevel, LogRing, DEFAULT_LOG_CAPACITY};
use crate::state::NodeState;
use crate::variables::VariableStore;

struct NodeStateEntry {
    state: NodeState,
    ts: DateTime<Utc>,
}

pub struct ExecutionContext {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub started_at: DateTime<Utc>,
    pub is_dry_run: bool,
    pub subworkflow_depth: u32,
    pub parent_execution_id: Option<ExecutionId>,

    variables: VariableStore,
    node_results: RwLock<HashMap<NodeId, Value>>,
    node_states: RwLock<HashMap<NodeId, NodeStateEntry>>,
    logs: RwLock<LogRing>,
    counters: Counters,
    cancellation: CancellationToken,
    cancel_reason: RwLock<Option<CancelReason>>,
}

impl ExecutionContext {
    #[must_use]
    pub fn new(execution_id: ExecutionId, workflow_id: WorkflowId) -> Self {
        Self {
            execution_id,
            workflow_id,
            started_at: Utc::now(),
            is_dry_run: false,
            subworkflow_depth: 0,
            parent_execution_id: None,
            variables: VariableStore::new_root(),
            node_results: RwLock::new(HashMap::new()),
            node_states: RwLock::new(HashMap::new()),
            logs: RwLock::new(LogRing::new(DEFAULT_LOG_CAPACITY)),
            counters: Counters::default(),
            cancellation: CancellationToken::new(),
            cancel_reason: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn dry_run(mut self) -> Self {
        self.is_dry_run = true;
        self
    }

    /// Builds a sub-workflow's nested context: deeper `subworkflow_depth`,
    /// globals shared via the parent's `VariableStore`, its own locals and
    /// node-state tables, and a child cancellation token so cancelling the
    /// parent cancels the nested execution too.
    #[must_use]
    pub fn spawn_subworkflow(&self, execution_id: ExecutionId, workflow_id: WorkflowId) -> Self {
        Self {
            execution_id,
            workflow_id,
            started_at: Utc::now(),
            is_dry_run: self.is_dry_run,
            subworkflow_depth: self.subworkflow_depth + 1,
            parent_execution_id: Some(self.execution_id),
            variables: self.variables.child(),
            node_results: RwLock::new(HashMap::new()),
            node_states: RwLock::new(HashMap::new()),
            logs: RwLock::new(LogRing::new(DEFAULT_LOG_CAPACITY)),
            counters: Counters::default(),
            cancellation: self.cancellation.child_token(),
            cancel_reason: RwLock::new(None),
        }
    }

    pub fn set_variable(&self, name: impl Into<String>, value: Value, scope: VariableScope) {
        self.variables.set(name, value, scope);
    }

    pub fn get_variable(&self, name: &str, scope: Option<VariableScope>) -> Option<Value> {
        self.variables.get(name, scope)
    }

    pub fn variable_snapshot(&self) -> HashMap<String, Value> {
        self.variables.snapshot()
    }

    pub fn set_node_result(&self, node_id: NodeId, value: Value) {
        self.node_results.write().insert(node_id, value);
    }

    pub fn get_node_result(&self, node_id: &NodeId) -> Option<Value> {
        self.node_results.read().get(node_id).cloned()
    }

    pub fn node_results_snapshot(&self) -> HashMap<NodeId, Value> {
        self.node_results.read().clone()
    }

    pub fn set_node_state(&self, node_id: NodeId, state: NodeState) -> Result<(), relay_error::RelayError> {
        let mut states = self.node_states.write();
        if let Some(existing) = states.get(&node_id) {
            crate::state::validate_transition(existing.state, state)?;
        }
        states.insert(
            node_id,
            NodeStateEntry {
                state,
                ts: Utc::now(),
            },
        );
        match state {
            NodeState::Completed => self.counters.record_node_executed(),
            NodeState::Failed => self.counters.record_node_failed(),
            NodeState::Retrying => self.counters.record_retry(),
            _ => {}
        }
        Ok(())
    }

    pub fn get_node_state(&self, node_id: &NodeId) -> Option<NodeState> {
        self.node_states.read().get(node_id).map(|e| e.state)
    }

    pub fn node_states_snapshot(&self) -> HashMap<NodeId, NodeState> {
        self.node_states.read().iter().map(|(id, e)| (id.clone(), e.state)).collect()
    }

    pub fn record_parallel_branches(&self, new_paths: u64) {
        self.counters.record_parallel_branches(new_paths);
    }

    pub fn add_log(&self, level: LogLevel, message: impl Into<String>, node_id: Option<NodeId>, data: Option<Value>) {
        self.logs.write().push(LogEntry {
            level,
            ts: Utc::now(),
            node_id: node_id.map(|n| n.to_string()),
            message: message.into(),
            data,
        });
    }

    pub fn logs_snapshot(&self) -> Vec<LogEntry> {
        self.logs.read().entries().cloned().collect()
    }

    pub fn counters(&self) -> CountersSnapshot {
        self.counters.snapshot()
    }

    pub fn duration(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    pub fn cancel(&self, reason: CancelReason) {
        *self.cancel_reason.write() = Some(reason);
        self.cancellation.cancel();
    }

    pub fn cancel_reason(&self) -> Option<CancelReason> {
        *self.cancel_reason.read()
    }

    pub fn check_cancelled(&self) -> Result<(), relay_error::RelayError> {
        if self.is_cancelled() {
            let reason = self.cancel_reason().unwrap_or(CancelReason::SchedulerShutdown);
            return Err(relay_error::RelayError::cancelled(reason));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    #[test]
    fn node_result_round_trips() {
        let ctx = ctx();
        let node = NodeId::from("a");
        ctx.set_node_result(node.clone(), json!(42));
        assert_eq!(ctx.get_node_result(&node), Some(json!(42)));
    }

    #[test]
    fn node_state_transition_is_validated() {
        let ctx = ctx();
        let node = NodeId::from("a");
        ctx.set_node_state(node.clone(), NodeState::Running).unwrap();
        ctx.set_node_state(node.clone(), NodeState::Completed).unwrap();
        assert!(ctx.set_node_state(node, NodeState::Running).is_err());
    }

    #[test]
    fn completing_a_node_increments_nodes_executed() {
        let ctx = ctx();
        let node = NodeId::from("a");
        ctx.set_node_state(node.clone(), NodeState::Running).unwrap();
        ctx.set_node_state(node, NodeState::Completed).unwrap();
        assert_eq!(ctx.counters().nodes_executed, 1);
    }

    #[test]
    fn cancellation_is_observable_and_carries_a_reason() {
        let ctx = ctx();
        assert!(ctx.check_cancelled().is_ok());
        ctx.cancel(CancelReason::UserCancelled);
        let err = ctx.check_cancelled().unwrap_err();
        assert!(matches!(err, relay_error::RelayError::Cancelled { reason: CancelReason::UserCancelled }));
    }

    #[test]
    fn subworkflow_shares_globals_but_not_locals() {
        let root = ctx();
        root.set_variable("g", json!(1), VariableScope::Global);
        root.set_variable("l", json!(2), VariableScope::Local);
        let child = root.spawn_subworkflow(ExecutionId::v4(), root.workflow_id);
        assert_eq!(child.get_variable("g", None), Some(json!(1)));
        assert_eq!(child.get_variable("l", None), None);
        assert_eq!(child.subworkflow_depth, 1);
        assert_eq!(child.parent_execution_id, Some(root.execution_id));
    }

    #[test]
    fn cancelling_parent_cancels_subworkflow_token() {
        let root = ctx();
        let child = root.spawn_subworkflow(ExecutionId::v4(), root.workflow_id);
        root.cancel(CancelReason::ExecutionTimeout);
        assert!(child.is_cancelled());
    }

    #[test]
    fn log_ring_retains_most_recent_entries() {
        let ctx = ctx();
        for i in 0..5 {
            ctx.add_log(LogLevel::Info, format!("entry {i}"), None, None);
        }
        assert_eq!(ctx.logs_snapshot().len(), 5);
    }
}
