//! Directed compute-graph builder. Models layer instances as nodes and
//! variable-carrying connections as edges; offers a Kahn topological
//! ordering (with cycle detection) and DOT emission for visualisation.
//! Standalone — nothing in the compilation pipeline depends on it.

use itertools::Itertools;
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug)]
pub struct ComputeNode {
    pub name: String,
    /// What the node instantiates, e.g. `Linear` or `Conv2d`.
    pub kind: String,
    inputs: Vec<NodeId>,
    outputs: Vec<ComputeEdge>,
}

#[derive(Debug, Clone)]
pub struct ComputeEdge {
    pub target: NodeId,
    /// The variable the data flows through.
    pub var: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cycle detected in compute graph")]
pub struct CycleError;

#[derive(Debug, Default)]
pub struct ComputeGraph {
    nodes: Vec<ComputeNode>,
    by_name: HashMap<String, NodeId>,
}

impl ComputeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        let name = name.into();
        self.nodes.push(ComputeNode {
            name: name.clone(),
            kind: kind.into(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        });
        self.by_name.insert(name, id);
        id
    }

    /// Connect `from -> to`. A second edge between the same pair is
    /// suppressed.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId, var: impl Into<String>) {
        if self.nodes[to.0].inputs.contains(&from) {
            return;
        }
        self.nodes[to.0].inputs.push(from);
        self.nodes[from.0].outputs.push(ComputeEdge {
            target: to,
            var: var.into(),
        });
    }

    /// Connect two nodes by name. Unknown names make this a no-op and
    /// report failure.
    pub fn add_edge_by_name(&mut self, from: &str, to: &str, var: impl Into<String>) -> bool {
        match (self.by_name.get(from), self.by_name.get(to)) {
            (Some(&from), Some(&to)) => {
                self.add_edge(from, to, var);
                true
            }
            _ => false,
        }
    }

    pub fn node(&self, id: NodeId) -> &ComputeNode {
        &self.nodes[id.0]
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Kahn's algorithm: a linearisation respecting every edge, or an
    /// error if the graph has a cycle.
    pub fn execution_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let mut in_degree: Vec<usize> = self.nodes.iter().map(|n| n.inputs.len()).collect();
        let mut queue: VecDeque<NodeId> = (0..self.nodes.len())
            .filter(|&i| in_degree[i] == 0)
            .map(NodeId)
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = queue.pop_front() {
            order.push(id);
            for edge in &self.nodes[id.0].outputs {
                in_degree[edge.target.0] -= 1;
                if in_degree[edge.target.0] == 0 {
                    queue.push_back(edge.target);
                }
            }
        }
        if order.len() != self.nodes.len() {
            return Err(CycleError);
        }
        Ok(order)
    }

    /// Render the graph in DOT format for Graphviz.
    pub fn to_dot(&self) -> String {
        let body = self
            .nodes
            .iter()
            .map(|node| {
                let mut lines = vec![format!(
                    "  {} [label=\"{}\\n({})\"];",
                    node.name, node.name, node.kind
                )];
                lines.extend(node.outputs.iter().map(|edge| {
                    format!(
                        "  {} -> {} [label=\"{}\"];",
                        node.name,
                        self.nodes[edge.target.0].name,
                        edge.var
                    )
                }));
                lines.join("\n")
            })
            .join("\n");
        format!(
            "digraph G {{\n  rankdir=LR;\n  node [shape=box];\n{}\n}}\n",
            body
        )
    }
}
