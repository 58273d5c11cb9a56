// src/dag/resolver.rs

//! Execution order from a task graph.
//!
//! Pure functions: nothing here touches targets or runs work.

use std::collections::HashSet;

use tracing::debug;

use crate::dag::graph::PipelineGraph;
use crate::dag::node::NodeId;
use crate::errors::{BatchdagError, Result};

/// Topological order of everything `root` transitively requires, `root` last.
///
/// Dependencies are visited in declaration order, so independent branches
/// always come out in the same order.
pub fn resolve(graph: &PipelineGraph, root: NodeId) -> Result<Vec<NodeId>> {
    let mut walk = Walk::new(graph);
    walk.visit(root)?;
    debug!(root = %graph.label(root), nodes = walk.order.len(), "resolved execution order");
    Ok(walk.order)
}

/// Topological order of the whole graph, seeded from its sinks in insertion
/// order.
pub fn resolve_all(graph: &PipelineGraph) -> Result<Vec<NodeId>> {
    let mut walk = Walk::new(graph);
    for sink in graph.sinks() {
        walk.visit(sink)?;
    }
    // Nodes that only sit on a cycle have no sink above them.
    for node in graph.node_ids() {
        walk.visit(node)?;
    }
    Ok(walk.order)
}

struct Walk<'a> {
    graph: &'a PipelineGraph,
    done: HashSet<NodeId>,
    /// Current DFS path, used both for cycle detection and to name the cycle.
    path: Vec<NodeId>,
    on_path: HashSet<NodeId>,
    order: Vec<NodeId>,
}

impl<'a> Walk<'a> {
    fn new(graph: &'a PipelineGraph) -> Self {
        Self {
            graph,
            done: HashSet::new(),
            path: Vec::new(),
            on_path: HashSet::new(),
            order: Vec::new(),
        }
    }

    fn visit(&mut self, node: NodeId) -> Result<()> {
        if self.done.contains(&node) {
            return Ok(());
        }
        if self.on_path.contains(&node) {
            return Err(self.cycle_error(node));
        }

        self.path.push(node);
        self.on_path.insert(node);

        for dep in self.graph.dependencies_of(node) {
            self.visit(*dep)?;
        }

        self.path.pop();
        self.on_path.remove(&node);
        self.done.insert(node);
        self.order.push(node);
        Ok(())
    }

    /// Cycle listed in dependent -> dependency direction, closed on itself.
    fn cycle_error(&self, repeated: NodeId) -> BatchdagError {
        let start = self
            .path
            .iter()
            .position(|n| *n == repeated)
            .unwrap_or(0);

        let mut cycle: Vec<String> = self.path[start..]
            .iter()
            .map(|n| self.graph.label(*n))
            .collect();
        cycle.push(self.graph.label(repeated));

        BatchdagError::CyclicDependency { cycle }
    }
}
