//! The event envelope and its 12 kinds (§4.7).

use chrono::{DateTime, Utc};
use relay_core::{ExecutionId, NodeId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    ExecutionStarted,
    ExecutionCompleted,
    ExecutionFailed,
    ExecutionCancelled,
    NodeStarted,
    NodeCompleted,
    NodeFailed,
    NodeRetrying,
    Log,
    Progress,
    Variables,
    Heartbeat,
}

impl EventKind {
    #[must_use]
    pub fn is_execution_terminal(self) -> bool {
        matches!(
            self,
            Self::ExecutionCompleted | Self::ExecutionFailed | Self::ExecutionCancelled
        )
    }
}

/// One event on an execution's stream. `sequence` is monotonic per
/// `execution_id`, assigned by the bus at publish time so publishers never
/// race each other over ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub kind: EventKind,
    pub execution_id: ExecutionId,
    pub sequence: u64,
    pub ts: DateTime<Utc>,
    pub node_id: Option<NodeId>,
    pub data: Option<Value>,
}
