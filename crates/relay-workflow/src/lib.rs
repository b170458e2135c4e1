//! Workflow data model, dependency graph, and structural validation.
//!
//! A `WorkflowDefinition` is immutable once execution begins (the engine
//! snapshots it — see `relay-execution`). This crate owns everything about
//! a definition that can be checked without running it.

mod graph;
mod types;
mod validate;

pub use graph::{plan, DependencyGraph, Plan};
pub use types::{NodeDefinition, NodeType, VariableScope, WorkflowDefinition};
pub use validate::{validate, ValidationReport};

pub mod prelude {
    pub use crate::{
        plan, validate, DependencyGraph, NodeDefinition, NodeType, Plan, ValidationReport,
        VariableScope, WorkflowDefinition,
    };
}
