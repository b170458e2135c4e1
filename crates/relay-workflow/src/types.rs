//! The workflow data model: a definition is a pure description with no
//! runtime state, grounded on `execution/src/plan.rs`'s use of
//! `nebula_workflow::{WorkflowDefinition, NodeDefinition, Connection}`.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use relay_core::{NodeId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of built-in node types (§4.3). Anything else is assumed
/// to name a registered connector and is carried as `Connector(type)`.
///
/// Serialized as its plain type string (`"http-request"`, not a tagged
/// object) since `NodeDefinition::type` is itself the discriminant field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeType {
    Start,
    TriggerManual,
    End,
    Output,
    Expression,
    SetVariable,
    Transform,
    HttpRequest,
    Delay,
    Branch,
    Loop,
    Retry,
    Subworkflow,
    Condition,
    Connector(String),
}

impl NodeType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Start => "start",
            Self::TriggerManual => "trigger-manual",
            Self::End => "end",
            Self::Output => "output",
            Self::Expression => "expression",
            Self::SetVariable => "set-variable",
            Self::Transform => "transform",
            Self::HttpRequest => "http-request",
            Self::Delay => "delay",
            Self::Branch => "branch",
            Self::Loop => "loop",
            Self::Retry => "retry",
            Self::Subworkflow => "subworkflow",
            Self::Condition => "condition",
            Self::Connector(t) => t,
        }
    }

    pub fn is_entry_type(&self) -> bool {
        matches!(self, Self::Start | Self::TriggerManual)
    }
}

impl From<&str> for NodeType {
    fn from(s: &str) -> Self {
        match s {
            "start" => Self::Start,
            "trigger-manual" => Self::TriggerManual,
            "end" => Self::End,
            "output" => Self::Output,
            "expression" => Self::Expression,
            "set-variable" => Self::SetVariable,
            "transform" => Self::Transform,
            "http-request" => Self::HttpRequest,
            "delay" => Self::Delay,
            "branch" => Self::Branch,
            "loop" => Self::Loop,
            "retry" => Self::Retry,
            "subworkflow" => Self::Subworkflow,
            "condition" => Self::Condition,
            other => Self::Connector(other.to_string()),
        }
    }
}

impl Serialize for NodeType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for NodeType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

/// A node is a pure description: an id, a type, a type-specific config
/// record, and the ids of its successors. It holds no runtime state — that
/// lives in `relay-execution`'s `ExecutionContext`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub config: Value,
    #[serde(default)]
    pub connections: Vec<NodeId>,
}

impl NodeDefinition {
    pub fn new(id: impl Into<NodeId>, node_type: NodeType) -> Self {
        Self {
            id: id.into(),
            node_type,
            config: Value::Null,
            connections: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: Value) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_connections(mut self, connections: Vec<NodeId>) -> Self {
        self.connections = connections;
        self
    }
}

/// Alias of `relay_core::ScopeLevel` under the name this crate's
/// `set-variable` node config uses (`"local"`/`"global"`).
pub use relay_core::ScopeLevel as VariableScope;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: WorkflowId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    #[serde(default)]
    pub metadata: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WorkflowDefinition {
    pub fn new(id: WorkflowId, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            description: None,
            nodes: Vec::new(),
            variables: HashMap::new(),
            metadata: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}
