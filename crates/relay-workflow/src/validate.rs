//! Structural validation, grounded on §4.1's rule list and the pattern of
//! returning a collected `{ok, errors, warnings}` report rather than
//! failing on the first problem, so a caller can surface every defect at
//! once (the teacher's `NebulaError` taxonomy favors this for user-authored
//! config the same way).

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::graph::DependencyGraph;
use crate::types::{NodeType, WorkflowDefinition};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub ok: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Runs every structural rule in §4.1 and returns a collected report. Does
/// not construct a `DependencyGraph` on success — callers that need one
/// should call `DependencyGraph::from_definition` separately once
/// `report.ok` is true.
pub fn validate(def: &WorkflowDefinition) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if def.nodes.is_empty() {
        errors.push("workflow has no nodes".to_string());
        return ValidationReport {
            ok: false,
            errors,
            warnings,
        };
    }

    let mut seen_ids = HashSet::new();
    for node in &def.nodes {
        if !seen_ids.insert(&node.id) {
            errors.push(format!("duplicate node id '{}'", node.id));
        }
    }

    let known_ids: HashSet<_> = def.nodes.iter().map(|n| &n.id).collect();
    let mut seen_edges = HashSet::new();
    for node in &def.nodes {
        for target in &node.connections {
            if target == &node.id {
                errors.push(format!("node '{}' has a self-loop", node.id));
                continue;
            }
            if !known_ids.contains(target) {
                errors.push(format!(
                    "node '{}' connects to unknown node '{target}'",
                    node.id
                ));
                continue;
            }
            if !seen_edges.insert((node.id.clone(), target.clone())) {
                warnings.push(format!("duplicate edge '{}' -> '{target}'", node.id));
            }
        }
    }

    let entry_count = def.nodes.iter().filter(|n| n.node_type.is_entry_type()).count();
    if entry_count == 0 {
        warnings.push("workflow has no start/trigger-manual node".to_string());
    } else if entry_count > 1 {
        warnings.push(format!(
            "workflow has {entry_count} start/trigger-manual nodes; exactly one is expected"
        ));
    }

    for node in &def.nodes {
        if let Err(e) = validate_node_config(node) {
            errors.push(e);
        }
    }

    if errors.is_empty() {
        if let Some(cycle) = DependencyGraph::find_cycle_path(def) {
            let path = cycle
                .iter()
                .map(std::string::ToString::to_string)
                .collect::<Vec<_>>()
                .join(" -> ");
            errors.push(format!("workflow graph contains a cycle: {path}"));
        }
    }

    if errors.is_empty() {
        warnings.extend(unreachable_from_entry_warnings(def));
    }

    ValidationReport {
        ok: errors.is_empty(),
        errors,
        warnings,
    }
}

fn validate_node_config(node: &crate::types::NodeDefinition) -> Result<(), String> {
    let obj = node.config.as_object();
    let field = |name: &str| obj.and_then(|o| o.get(name));

    match &node.node_type {
        NodeType::HttpRequest => {
            if !matches!(field("url"), Some(serde_json::Value::String(_))) {
                return Err(format!("node '{}': http-request requires a 'url' string", node.id));
            }
        }
        NodeType::Delay => {
            let duration_ok = field("duration").and_then(serde_json::Value::as_f64).is_some_and(|d| d > 0.0);
            if !duration_ok {
                return Err(format!(
                    "node '{}': delay requires a positive numeric 'duration'",
                    node.id
                ));
            }
            let unit_ok = field("unit")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|u| matches!(u, "ms" | "s" | "m" | "h"));
            if !unit_ok {
                return Err(format!(
                    "node '{}': delay requires 'unit' to be one of ms/s/m/h",
                    node.id
                ));
            }
        }
        NodeType::SetVariable => {
            let name_ok = field("name")
                .and_then(serde_json::Value::as_str)
                .is_some_and(is_valid_identifier);
            if !name_ok {
                return Err(format!(
                    "node '{}': set-variable requires a syntactically valid identifier 'name'",
                    node.id
                ));
            }
        }
        NodeType::Transform => {
            let steps_ok = field("transformations")
                .and_then(serde_json::Value::as_array)
                .is_some_and(|steps| {
                    steps.iter().all(|s| {
                        s.as_object()
                            .and_then(|o| o.keys().next())
                            .is_some_and(|k| matches!(k.as_str(), "map" | "filter" | "extract" | "format"))
                    })
                });
            if !steps_ok {
                return Err(format!(
                    "node '{}': transform requires 'transformations' naming map/filter/extract/format steps",
                    node.id
                ));
            }
        }
        NodeType::Branch => {
            if field("condition").is_none() {
                return Err(format!("node '{}': branch requires a 'condition'", node.id));
            }
        }
        NodeType::Loop => {
            let loop_type_ok = field("loopType")
                .and_then(serde_json::Value::as_str)
                .is_some_and(|t| matches!(t, "forEach" | "while"));
            if !loop_type_ok {
                return Err(format!(
                    "node '{}': loop requires 'loopType' to be forEach or while",
                    node.id
                ));
            }
        }
        NodeType::Retry => {
            let max_attempts_ok = field("maxAttempts").and_then(serde_json::Value::as_u64).is_some_and(|n| n > 0);
            if !max_attempts_ok {
                return Err(format!(
                    "node '{}': retry requires a positive integer 'maxAttempts'",
                    node.id
                ));
            }
        }
        _ => {}
    }
    Ok(())
}

fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn unreachable_from_entry_warnings(def: &WorkflowDefinition) -> Vec<String> {
    let entries: Vec<_> = def
        .nodes
        .iter()
        .filter(|n| n.node_type.is_entry_type())
        .map(|n| n.id.clone())
        .collect();
    if entries.is_empty() {
        return Vec::new();
    }

    let adjacency: HashMap<_, _> = def.nodes.iter().map(|n| (&n.id, &n.connections)).collect();
    let mut reachable: HashSet<_> = HashSet::new();
    let mut stack = entries;
    while let Some(id) = stack.pop() {
        if reachable.insert(id.clone()) {
            if let Some(targets) = adjacency.get(&id) {
                stack.extend(targets.iter().cloned());
            }
        }
    }

    def.nodes
        .iter()
        .filter(|n| !reachable.contains(&n.id))
        .map(|n| format!("node '{}' is unreachable from any start node", n.id))
        .collect()
}
