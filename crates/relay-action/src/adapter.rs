//! The connector adapter trait (§4.4), grounded on `action/src/action.rs`'s
//! object-safe `Action` trait — narrowed to one execution method since the
//! spec draws no distinction between Process/Stateful/Trigger action kinds.

use std::collections::HashMap;

use async_trait::async_trait;
use relay_core::NodeId;
use relay_error::RelayError;
use relay_execution::ExecutionContext;
use relay_workflow::NodeDefinition;
use serde_json::Value;

/// Implemented once per connector type. `execute` is responsible for
/// honoring `ctx.is_dry_run` itself: a dry run must return a
/// shape-compatible, side-effect-free placeholder rather than calling out.
#[async_trait]
pub trait ConnectorAdapter: Send + Sync {
    async fn execute(
        &self,
        node: &NodeDefinition,
        prev_results: &HashMap<NodeId, Value>,
        ctx: &ExecutionContext,
    ) -> Result<Value, RelayError>;
}

pub struct ConnectorDefinition {
    pub connector_type: String,
    pub adapter: std::sync::Arc<dyn ConnectorAdapter>,
}

impl ConnectorDefinition {
    #[must_use]
    pub fn new(connector_type: impl Into<String>, adapter: std::sync::Arc<dyn ConnectorAdapter>) -> Self {
        Self {
            connector_type: connector_type.into(),
            adapter,
        }
    }
}
