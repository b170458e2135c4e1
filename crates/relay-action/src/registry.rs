//! `ConnectorRegistry` (§4.4): maps a connector type string to its
//! `ConnectorDefinition`, dispatches `execute`, and tracks per-type
//! statistics. Grounded on `action/src/registry.rs`'s `ActionRegistry`
//! (`HashMap<String, Arc<dyn Action>>`, register/get/list/unregister), with
//! dispatch and statistics added per §4.4.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_workflow::NodeDefinition;
use serde_json::Value;

use crate::adapter::ConnectorDefinition;
use crate::stats::{ConnectorStats, ConnectorStatsSnapshot};

#[derive(Default)]
pub struct ConnectorRegistry {
    definitions: RwLock<HashMap<String, Arc<ConnectorDefinition>>>,
    stats: RwLock<HashMap<String, Arc<ConnectorStats>>>,
}

impl ConnectorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector type. Fails if `connector_type` is empty.
    pub fn register(&self, definition: ConnectorDefinition) -> Result<(), RelayError> {
        if definition.connector_type.is_empty() {
            return Err(RelayError::validation("connector type must not be empty"));
        }
        let key = definition.connector_type.clone();
        self.definitions.write().insert(key.clone(), Arc::new(definition));
        self.stats.write().entry(key).or_insert_with(|| Arc::new(ConnectorStats::default()));
        Ok(())
    }

    #[must_use]
    pub fn get(&self, connector_type: &str) -> Option<Arc<ConnectorDefinition>> {
        self.definitions.read().get(connector_type).cloned()
    }

    #[must_use]
    pub fn list(&self) -> Vec<String> {
        let mut types: Vec<String> = self.definitions.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn unregister(&self, connector_type: &str) -> Option<Arc<ConnectorDefinition>> {
        self.definitions.write().remove(connector_type)
    }

    /// Dispatches to the registered adapter, recording duration and
    /// failure statistics for `connector_type` regardless of outcome.
    pub async fn execute(
        &self,
        connector_type: &str,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError> {
        let definition = self
            .get(connector_type)
            .ok_or_else(|| RelayError::validation(format!("no connector registered for type '{connector_type}'")))?;

        let stats = Arc::clone(
            self.stats
                .write()
                .entry(connector_type.to_string())
                .or_insert_with(|| Arc::new(ConnectorStats::default())),
        );

        let started = Instant::now();
        let result = definition.adapter.execute(node, prev_results, ctx).await;
        stats.record(started.elapsed(), result.is_err());
        result
    }

    #[must_use]
    pub fn statistics(&self, connector_type: &str) -> Option<ConnectorStatsSnapshot> {
        self.stats.read().get(connector_type).map(|s| s.snapshot())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use relay_core::{ExecutionId, WorkflowId};
    use relay_workflow::NodeType;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl crate::adapter::ConnectorAdapter for Echo {
        async fn execute(
            &self,
            _node: &NodeDefinition,
            _prev_results: &HashMap<NodeId, Value>,
            _ctx: &ExecutionContext,
        ) -> Result<Value, RelayError> {
            Ok(json!({"echoed": true}))
        }
    }

    struct AlwaysFails;

    #[async_trait]
    impl crate::adapter::ConnectorAdapter for AlwaysFails {
        async fn execute(
            &self,
            _node: &NodeDefinition,
            _prev_results: &HashMap<NodeId, Value>,
            _ctx: &ExecutionContext,
        ) -> Result<Value, RelayError> {
            Err(RelayError::adapter("boom", true))
        }
    }

    fn ctx() -> ExecutionContext {
        ExecutionContext::new(ExecutionId::v4(), WorkflowId::v4())
    }

    fn node() -> NodeDefinition {
        NodeDefinition::new(NodeId::from("n1"), NodeType::Connector("echo".into()))
    }

    #[test]
    fn registering_empty_type_fails() {
        let registry = ConnectorRegistry::new();
        let err = registry
            .register(ConnectorDefinition::new("", Arc::new(Echo)))
            .unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }

    #[tokio::test]
    async fn execute_dispatches_to_the_registered_adapter() {
        let registry = ConnectorRegistry::new();
        registry.register(ConnectorDefinition::new("echo", Arc::new(Echo))).unwrap();

        let result = registry.execute("echo", &node(), &HashMap::new(), &ctx()).await.unwrap();
        assert_eq!(result, json!({"echoed": true}));
    }

    #[tokio::test]
    async fn execute_on_unknown_type_is_a_validation_error() {
        let registry = ConnectorRegistry::new();
        let err = registry.execute("missing", &node(), &HashMap::new(), &ctx()).await.unwrap_err();
        assert!(matches!(err, RelayError::Validation { .. }));
    }

    #[tokio::test]
    async fn statistics_track_executions_and_failures_per_type() {
        let registry = ConnectorRegistry::new();
        registry.register(ConnectorDefinition::new("echo", Arc::new(Echo))).unwrap();
        registry.register(ConnectorDefinition::new("fail", Arc::new(AlwaysFails))).unwrap();

        registry.execute("echo", &node(), &HashMap::new(), &ctx()).await.unwrap();
        let _ = registry.execute("fail", &node(), &HashMap::new(), &ctx()).await;

        let echo_stats = registry.statistics("echo").unwrap();
        assert_eq!(echo_stats.executions, 1);
        assert_eq!(echo_stats.failures, 0);

        let fail_stats = registry.statistics("fail").unwrap();
        assert_eq!(fail_stats.executions, 1);
        assert_eq!(fail_stats.failures, 1);
    }

    #[test]
    fn list_is_sorted() {
        let registry = ConnectorRegistry::new();
        registry.register(ConnectorDefinition::new("b", Arc::new(Echo))).unwrap();
        registry.register(ConnectorDefinition::new("a", Arc::new(Echo))).unwrap();
        assert_eq!(registry.list(), vec!["a", "b"]);
    }

}
