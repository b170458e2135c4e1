//! The persistence port (§6.2): workflow lookup plus execution-record
//! bookkeeping. The engine never assumes a concrete store — `InMemoryPersistence`
//! is both the test double and a perfectly usable embedding for callers that
//! don't need durable history.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use relay_core::{ExecutionId, WorkflowId};
use relay_error::{PublicError, RelayError};
use relay_execution::{CountersSnapshot, LogEntry};
use relay_workflow::WorkflowDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::result::ExecutionStatus;

/// A row in the execution history. Created when an execution starts,
/// updated in place once it reaches a terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub execution_id: ExecutionId,
    pub workflow_id: WorkflowId,
    pub status: ExecutionStatus,
    pub output: Option<Value>,
    pub error: Option<PublicError>,
    pub metrics: CountersSnapshot,
}

/// The persistence collaborator (§6.2): workflow definitions and execution
/// history, never a concrete SQL driver. `subworkflow` dispatch is the only
/// caller of `load_workflow`; the rest back `getExecutionStatus`'s persisted
/// fallback and an audit trail an embedder can choose to keep.
#[async_trait]
pub trait PersistencePort: Send + Sync {
    async fn load_workflow(&self, id: WorkflowId) -> Result<WorkflowDefinition, RelayError>;
    async fn create_execution(&self, record: ExecutionRecord) -> Result<(), RelayError>;
    async fn complete_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<PublicError>,
        metrics: CountersSnapshot,
    ) -> Result<(), RelayError>;
    async fn append_execution_log(&self, id: ExecutionId, entries: Vec<LogEntry>) -> Result<(), RelayError>;
}

/// In-memory double good enough for tests and for embedders that don't need
/// durable history: workflows are registered up front, execution records and
/// logs live for the process's lifetime.
#[derive(Default)]
pub struct InMemoryPersistence {
    workflows: RwLock<HashMap<WorkflowId, WorkflowDefinition>>,
    executions: RwLock<HashMap<ExecutionId, ExecutionRecord>>,
    logs: RwLock<HashMap<ExecutionId, Vec<LogEntry>>>,
}

impl InMemoryPersistence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_workflow(self, def: WorkflowDefinition) -> Self {
        self.workflows.write().insert(def.id, def);
        self
    }

    #[must_use]
    pub fn execution(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        self.executions.read().get(&id).cloned()
    }

    #[must_use]
    pub fn logs(&self, id: ExecutionId) -> Vec<LogEntry> {
        self.logs.read().get(&id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl PersistencePort for InMemoryPersistence {
    async fn load_workflow(&self, id: WorkflowId) -> Result<WorkflowDefinition, RelayError> {
        self.workflows
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| RelayError::validation(format!("no workflow registered for id '{id}'")))
    }

    async fn create_execution(&self, record: ExecutionRecord) -> Result<(), RelayError> {
        self.executions.write().insert(record.execution_id, record);
        Ok(())
    }

    async fn complete_execution(
        &self,
        id: ExecutionId,
        status: ExecutionStatus,
        output: Option<Value>,
        error: Option<PublicError>,
        metrics: CountersSnapshot,
    ) -> Result<(), RelayError> {
        if let Some(record) = self.executions.write().get_mut(&id) {
            record.status = status;
            record.output = output;
            record.error = error;
            record.metrics = metrics;
        }
        Ok(())
    }

    async fn append_execution_log(&self, id: ExecutionId, entries: Vec<LogEntry>) -> Result<(), RelayError> {
        self.logs.write().entry(id).or_default().extend(entries);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_workflow::WorkflowDefinition as Def;

    #[tokio::test]
    async fn missing_workflow_is_a_validation_error() {
        let store = InMemoryPersistence::new();
        let err = store.load_workflow(WorkflowId::v4()).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }

    #[tokio::test]
    async fn registered_workflow_loads_back() {
        let def = Def::new(WorkflowId::v4(), "demo");
        let id = def.id;
        let store = InMemoryPersistence::new().with_workflow(def);
        let loaded = store.load_workflow(id).await.unwrap();
        assert_eq!(loaded.id, id);
    }

    #[tokio::test]
    async fn execution_record_round_trips_through_create_and_complete() {
        let store = InMemoryPersistence::new();
        let execution_id = ExecutionId::v4();
        let workflow_id = WorkflowId::v4();
        store
            .create_execution(ExecutionRecord {
                execution_id,
                workflow_id,
                status: ExecutionStatus::Running,
                output: None,
                error: None,
                metrics: CountersSnapshot { nodes_executed: 0, nodes_failed: 0, retries: 0, parallel_branches: 0 },
            })
            .await
            .unwrap();

        store
            .complete_execution(
                execution_id,
                ExecutionStatus::Completed,
                Some(serde_json::json!({"ok": true})),
                None,
                CountersSnapshot { nodes_executed: 3, nodes_failed: 0, retries: 0, parallel_branches: 0 },
            )
            .await
            .unwrap();

        let record = store.execution(execution_id).unwrap();
        assert_eq!(record.status, ExecutionStatus::Completed);
        assert_eq!(record.metrics.nodes_executed, 3);
    }
}
