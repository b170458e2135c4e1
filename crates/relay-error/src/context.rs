//! Structured context attached to an error before it crosses a component boundary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Extra information attached to an error: where it happened and why.
///
/// Context never holds secrets or host stack traces — only what the
/// error-handling design (propagation policy) allows to reach a subscriber.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ErrorContext {
    pub description: String,
    component: Option<String>,
    operation: Option<String>,
    node_id: Option<String>,
    metadata: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_component(mut self, component: impl Into<String>) -> Self {
        self.component = Some(component.into());
        self
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn component(&self) -> Option<&str> {
        self.component.as_deref()
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn node_id(&self) -> Option<&str> {
        self.node_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_round_trip() {
        let ctx = ErrorContext::new("evaluating expression")
            .with_component("expression")
            .with_operation("eval")
            .with_node_id("n1");
        assert_eq!(ctx.description, "evaluating expression");
        assert_eq!(ctx.component(), Some("expression"));
        assert_eq!(ctx.operation(), Some("eval"));
        assert_eq!(ctx.node_id(), Some("n1"));
    }
}
