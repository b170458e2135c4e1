//! Bridges an [`ExecutionContext`] and a node's `prevResults` into the
//! expression evaluator's [`EvaluationContext`], for adapters (transform,
//! conditional, validation) that need to evaluate user expressions against
//! runtime data.

use std::collections::HashMap;

use relay_core::NodeId;
use relay_execution::ExecutionContext;
use relay_expression::EvaluationContext;
use serde_json::Value;

#[must_use]
pub fn build_context(prev_results: &HashMap<NodeId, Value>, ctx: &ExecutionContext) -> EvaluationContext {
    let mut builder = EvaluationContext::builder();
    for (node_id, value) in prev_results {
        builder = builder.node(node_id.to_string(), value.clone());
    }
    for (name, value) in ctx.variable_snapshot() {
        builder = builder.execution_var(name, value);
    }
    builder.build()
}
