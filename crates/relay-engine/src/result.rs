//! Shapes returned across the engine's public surface (§6.1, §4.6).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use relay_core::{ExecutionId, NodeId, WorkflowId};
use relay_error::PublicError;
use relay_execution::{CountersSnapshot, NodeState};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// Returned by `Engine::execute_workflow` once the execution reaches a
/// terminal state — the call blocks until then (§6.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub execution_id: ExecutionId,
    pub status: ExecutionStatus,
    pub result: Option<Value>,
    pub error: Option<PublicError>,
    pub metrics: CountersSnapshot,
}

/// A point-in-time view of a running or completed execution (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub node_states: HashMap<NodeId, NodeState>,
    pub node_results: HashMap<NodeId, Value>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: i64,
    pub metrics: CountersSnapshot,
}
