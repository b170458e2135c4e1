//! Identifiers and scope types shared across every relay crate.

pub mod id;
pub mod scope;

pub use id::{ConnectorType, ExecutionId, NodeId, WorkflowId};
pub use scope::ScopeLevel;

pub mod prelude {
    pub use crate::{ConnectorType, ExecutionId, NodeId, ScopeLevel, WorkflowId};
}
