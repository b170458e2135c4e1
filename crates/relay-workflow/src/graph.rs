//! Dependency graph construction, cycle detection, and topological
//! readiness, grounded on `nebula_workflow::DependencyGraph`'s call shape
//! as used by `execution/src/plan.rs` (`from_definition`, `compute_levels`,
//! `entry_nodes`, `exit_nodes`, `node_count`).

use std::collections::{HashMap, HashSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use relay_core::NodeId;
use relay_error::RelayError;

use crate::types::WorkflowDefinition;

/// A validated, petgraph-backed dependency graph over a workflow's nodes.
pub struct DependencyGraph {
    graph: DiGraph<NodeId, ()>,
    index_of: HashMap<NodeId, NodeIndex>,
}

impl DependencyGraph {
    /// Builds the graph from a definition. Fails if a connection references
    /// a node id that doesn't exist in the definition (§3 invariant) or if
    /// the result contains a cycle.
    pub fn from_definition(def: &WorkflowDefinition) -> Result<Self, RelayError> {
        let mut graph = DiGraph::new();
        let mut index_of = HashMap::with_capacity(def.nodes.len());

        for node in &def.nodes {
            let idx = graph.add_node(node.id.clone());
            index_of.insert(node.id.clone(), idx);
        }

        for node in &def.nodes {
            let from_idx = index_of[&node.id];
            for target in &node.connections {
                let Some(&to_idx) = index_of.get(target) else {
                    return Err(RelayError::validation(format!(
                        "node '{}' connects to unknown node '{target}'",
                        node.id
                    )));
                };
                graph.add_edge(from_idx, to_idx, ());
            }
        }

        if is_cyclic_directed(&graph) {
            return Err(RelayError::validation(
                "workflow graph contains a cycle".to_string(),
            ));
        }

        Ok(Self { graph, index_of })
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn entry_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    pub fn exit_nodes(&self) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Kahn's-algorithm-style level decomposition: group nodes into waves
    /// where every node in a wave has all its predecessors in a prior wave.
    /// Used by the ahead-of-time planner; the live scheduler in
    /// `relay-engine` uses `ready()` instead, which reacts to actual
    /// completion rather than a static level assignment.
    pub fn compute_levels(&self) -> Result<Vec<Vec<NodeId>>, RelayError> {
        let mut in_degree: HashMap<NodeIndex, usize> = self
            .graph
            .node_indices()
            .map(|idx| {
                (
                    idx,
                    self.graph
                        .neighbors_directed(idx, petgraph::Direction::Incoming)
                        .count(),
                )
            })
            .collect();

        let mut levels = Vec::new();
        let mut remaining: HashSet<NodeIndex> = self.graph.node_indices().collect();

        while !remaining.is_empty() {
            let ready: Vec<NodeIndex> = remaining
                .iter()
                .copied()
                .filter(|idx| in_degree[idx] == 0)
                .collect();

            if ready.is_empty() {
                return Err(RelayError::validation(
                    "workflow graph contains a cycle".to_string(),
                ));
            }

            for &idx in &ready {
                remaining.remove(&idx);
                for succ in self.graph.neighbors_directed(idx, petgraph::Direction::Outgoing) {
                    if let Some(count) = in_degree.get_mut(&succ) {
                        *count = count.saturating_sub(1);
                    }
                }
            }

            let mut level: Vec<NodeId> = ready.into_iter().map(|idx| self.graph[idx].clone()).collect();
            level.sort();
            levels.push(level);
        }

        Ok(levels)
    }

    /// The only scheduling primitive the live scheduler needs: every node
    /// whose not-yet-completed predecessor count is zero and that has not
    /// itself already completed.
    pub fn ready(&self, completed: &HashSet<NodeId>) -> Vec<NodeId> {
        self.graph
            .node_indices()
            .filter(|&idx| {
                let id = &self.graph[idx];
                if completed.contains(id) {
                    return false;
                }
                self.graph
                    .neighbors_directed(idx, petgraph::Direction::Incoming)
                    .all(|pred_idx| completed.contains(&self.graph[pred_idx]))
            })
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    pub fn successors(&self, id: &NodeId) -> Vec<NodeId> {
        let Some(&idx) = self.index_of.get(id) else {
            return Vec::new();
        };
        self.graph
            .neighbors_directed(idx, petgraph::Direction::Outgoing)
            .map(|succ| self.graph[succ].clone())
            .collect()
    }

    /// Finds the first cycle's node path, used to produce a readable
    /// validation error when `from_definition` would otherwise only say
    /// "contains a cycle". Depth-first with an explicit recursion stack,
    /// per §4.1's cycle-detection description.
    pub fn find_cycle_path(def: &WorkflowDefinition) -> Option<Vec<NodeId>> {
        let adjacency: HashMap<&NodeId, &[NodeId]> = def
            .nodes
            .iter()
            .map(|n| (&n.id, n.connections.as_slice()))
            .collect();

        let mut visited: HashSet<&NodeId> = HashSet::new();
        let mut stack: HashSet<&NodeId> = HashSet::new();
        let mut path: Vec<&NodeId> = Vec::new();

        fn visit<'a>(
            id: &'a NodeId,
            adjacency: &HashMap<&'a NodeId, &'a [NodeId]>,
            visited: &mut HashSet<&'a NodeId>,
            stack: &mut HashSet<&'a NodeId>,
            path: &mut Vec<&'a NodeId>,
        ) -> Option<Vec<NodeId>> {
            if stack.contains(id) {
                let start = path.iter().position(|n| *n == id).unwrap_or(0);
                let mut cycle: Vec<NodeId> = path[start..].iter().map(|n| (**n).clone()).collect();
                cycle.push(id.clone());
                return Some(cycle);
            }
            if visited.contains(id) {
                return None;
            }
            visited.insert(id);
            stack.insert(id);
            path.push(id);
            if let Some(targets) = adjacency.get(id) {
                for target in *targets {
                    if let Some(cycle) = visit(target, adjacency, visited, stack, path) {
                        return Some(cycle);
                    }
                }
            }
            path.pop();
            stack.remove(id);
            None
        }

        for node in &def.nodes {
            if let Some(cycle) = visit(&node.id, &adjacency, &mut visited, &mut stack, &mut path) {
                return Some(cycle);
            }
        }
        None
    }
}

/// The planner's public result shape (§4.1: `plan(def) -> Plan`), built on
/// top of `DependencyGraph` for callers that want a plain adjacency view
/// rather than the petgraph-backed structure.
#[derive(Debug, Clone)]
pub struct Plan {
    pub adjacency: HashMap<NodeId, Vec<NodeId>>,
    pub reverse_adjacency: HashMap<NodeId, Vec<NodeId>>,
    pub in_degree: HashMap<NodeId, usize>,
    pub root_nodes: Vec<NodeId>,
}

/// Validates and plans a definition in one call — the `plan(def) -> Plan`
/// operation. Callers that already validated separately can go straight to
/// `DependencyGraph::from_definition`.
pub fn plan(def: &WorkflowDefinition) -> Result<Plan, RelayError> {
    let graph = DependencyGraph::from_definition(def)?;

    let mut adjacency = HashMap::new();
    let mut reverse_adjacency: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut in_degree = HashMap::new();

    for node in &def.nodes {
        adjacency.insert(node.id.clone(), graph.successors(&node.id));
        in_degree.entry(node.id.clone()).or_insert(0);
    }
    for node in &def.nodes {
        for target in &node.connections {
            reverse_adjacency.entry(target.clone()).or_default().push(node.id.clone());
            *in_degree.entry(target.clone()).or_insert(0) += 1;
        }
    }

    Ok(Plan {
        adjacency,
        reverse_adjacency,
        in_degree,
        root_nodes: graph.entry_nodes(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::NodeType;
    use relay_core::WorkflowId;

    fn node(id: &str, connections: &[&str]) -> crate::types::NodeDefinition {
        crate::types::NodeDefinition::new(id, NodeType::Expression)
            .with_connections(connections.iter().map(|s| NodeId::from(*s)).collect())
    }

    fn workflow(nodes: Vec<crate::types::NodeDefinition>) -> WorkflowDefinition {
        let mut wf = WorkflowDefinition::new(WorkflowId::v4(), "test");
        wf.nodes = nodes;
        wf
    }

    #[test]
    fn linear_chain_has_three_levels() {
        let wf = workflow(vec![node("a", &["b"]), node("b", &["c"]), node("c", &[])]);
        let graph = DependencyGraph::from_definition(&wf).unwrap();
        let levels = graph.compute_levels().unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(graph.entry_nodes(), vec![NodeId::from("a")]);
        assert_eq!(graph.exit_nodes(), vec![NodeId::from("c")]);
    }

    #[test]
    fn diamond_shape_has_parallel_middle_level() {
        let wf = workflow(vec![
            node("a", &["b", "c"]),
            node("b", &["d"]),
            node("c", &["d"]),
            node("d", &[]),
        ]);
        let graph = DependencyGraph::from_definition(&wf).unwrap();
        let levels = graph.compute_levels().unwrap();
        assert_eq!(levels.len(), 3);
        assert_eq!(levels[1].len(), 2);
    }

    #[test]
    fn cycle_is_rejected() {
        let wf = workflow(vec![node("a", &["b"]), node("b", &["a"])]);
        assert!(DependencyGraph::from_definition(&wf).is_err());
    }

    #[test]
    fn unknown_connection_target_is_rejected() {
        let wf = workflow(vec![node("a", &["ghost"])]);
        assert!(DependencyGraph::from_definition(&wf).is_err());
    }

    #[test]
    fn ready_reacts_to_completed_set() {
        let wf = workflow(vec![node("a", &["b"]), node("b", &[])]);
        let graph = DependencyGraph::from_definition(&wf).unwrap();
        assert_eq!(graph.ready(&HashSet::new()), vec![NodeId::from("a")]);
        let mut completed = HashSet::new();
        completed.insert(NodeId::from("a"));
        assert_eq!(graph.ready(&completed), vec![NodeId::from("b")]);
    }

    #[test]
    fn find_cycle_path_reports_the_cycle() {
        let wf = workflow(vec![node("a", &["b"]), node("b", &["c"]), node("c", &["a"])]);
        let cycle = DependencyGraph::find_cycle_path(&wf).unwrap();
        assert!(cycle.len() >= 2);
    }

    #[test]
    fn plan_reports_adjacency_and_in_degree() {
        let wf = workflow(vec![node("a", &["b"]), node("b", &[])]);
        let p = plan(&wf).unwrap();
        assert_eq!(p.adjacency[&NodeId::from("a")], vec![NodeId::from("b")]);
        assert_eq!(p.in_degree[&NodeId::from("b")], 1);
        assert_eq!(p.root_nodes, vec![NodeId::from("a")]);
    }
}
