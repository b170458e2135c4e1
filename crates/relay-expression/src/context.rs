//! Evaluation context: the only data an expression can see.
//!
//! Grounded on `expression/src/context/mod.rs`'s `EvaluationContext` shape
//! (node outputs, execution variables, workflow metadata, trigger input),
//! with `Arc<Value>` sharing to avoid cloning large node payloads per
//! evaluation. Extended with a fixed list of root names so the parser's
//! single `Variable` first-segment always resolves deterministically.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// Root names a `Variable` path's first segment may address. Anything else
/// fails to resolve rather than silently returning `null`.
const RESERVED_ROOTS: &[&str] = &["node", "execution", "workflow", "input"];

#[derive(Debug, Clone, Default)]
pub struct EvaluationContext {
    nodes: HashMap<String, Arc<Value>>,
    execution_vars: HashMap<String, Arc<Value>>,
    workflow: Arc<Value>,
    input: Arc<Value>,
}

impl EvaluationContext {
    pub fn builder() -> EvaluationContextBuilder {
        EvaluationContextBuilder::default()
    }

    pub fn set_node_data(&mut self, node_id: impl Into<String>, data: Value) {
        self.nodes.insert(node_id.into(), Arc::new(data));
    }

    pub fn get_node_data(&self, node_id: &str) -> Option<&Value> {
        self.nodes.get(node_id).map(Arc::as_ref)
    }

    pub fn set_execution_var(&mut self, name: impl Into<String>, value: Value) {
        self.execution_vars.insert(name.into(), Arc::new(value));
    }

    pub fn get_execution_var(&self, name: &str) -> Option<&Value> {
        self.execution_vars.get(name).map(Arc::as_ref)
    }

    pub fn set_workflow(&mut self, value: Value) {
        self.workflow = Arc::new(value);
    }

    pub fn set_input(&mut self, value: Value) {
        self.input = Arc::new(value);
    }

    /// Resolves the first segment of a `Variable` path. Execution variables
    /// shadow the reserved roots, matching the teacher's precedence.
    pub fn resolve_root(&self, name: &str) -> Option<Value> {
        if let Some(v) = self.execution_vars.get(name) {
            return Some(v.as_ref().clone());
        }
        match name {
            "node" => Some(Value::Object(
                self.nodes
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_ref().clone()))
                    .collect(),
            )),
            "execution" => Some(Value::Object(
                self.execution_vars
                    .iter()
                    .map(|(k, v)| (k.clone(), v.as_ref().clone()))
                    .collect(),
            )),
            "workflow" => Some(self.workflow.as_ref().clone()),
            "input" => Some(self.input.as_ref().clone()),
            _ => None,
        }
    }

    pub fn is_reserved_root(name: &str) -> bool {
        RESERVED_ROOTS.contains(&name)
    }
}

#[derive(Debug, Default)]
pub struct EvaluationContextBuilder {
    ctx: EvaluationContext,
}

impl EvaluationContextBuilder {
    pub fn node(mut self, node_id: impl Into<String>, data: Value) -> Self {
        self.ctx.set_node_data(node_id, data);
        self
    }

    pub fn execution_var(mut self, name: impl Into<String>, value: Value) -> Self {
        self.ctx.set_execution_var(name, value);
        self
    }

    pub fn workflow(mut self, value: Value) -> Self {
        self.ctx.set_workflow(value);
        self
    }

    pub fn input(mut self, value: Value) -> Self {
        self.ctx.set_input(value);
        self
    }

    pub fn build(self) -> EvaluationContext {
        self.ctx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn node_data_round_trips() {
        let ctx = EvaluationContext::builder()
            .node("fetchUser", json!({"id": 1}))
            .build();
        assert_eq!(ctx.get_node_data("fetchUser"), Some(&json!({"id": 1})));
    }

    #[test]
    fn execution_vars_shadow_reserved_roots() {
        let ctx = EvaluationContext::builder()
            .execution_var("node", json!("shadowed"))
            .build();
        assert_eq!(ctx.resolve_root("node"), Some(json!("shadowed")));
    }

    #[test]
    fn unknown_root_does_not_resolve() {
        let ctx = EvaluationContext::builder().build();
        assert_eq!(ctx.resolve_root("globalThis"), None);
    }
}
