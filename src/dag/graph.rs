// src/dag/graph.rs

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::Direction;
use petgraph::graph::DiGraph;
use petgraph::visit::Dfs;
use tracing::debug;

use crate::dag::node::{NodeId, TaskId, TaskNode, Work};
use crate::dag::target::Target;

/// Incrementally assembles a [`PipelineGraph`].
///
/// Edges point from a dependency to its dependent. The builder does not
/// reject cycles; that is the resolver's job, so malformed graphs fail
/// before anything executes.
#[derive(Debug)]
pub struct GraphBuilder {
    state_root: PathBuf,
    graph: DiGraph<TaskNode, ()>,
    index: HashMap<TaskId, NodeId>,
}

impl GraphBuilder {
    /// `state_root` is the directory holding completion markers.
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
            graph: DiGraph::new(),
            index: HashMap::new(),
        }
    }

    /// Add a task whose marker lives under the state root.
    ///
    /// Adding an id that is already present returns the existing node and
    /// drops `work`.
    pub fn add_task(&mut self, id: TaskId, work: Work) -> NodeId {
        let target = Target::new(id.to_string(), self.state_root.join(id.marker_file_name()));
        self.add_task_with_target(id, target, work)
    }

    /// Add a task with an explicitly placed marker.
    pub fn add_task_with_target(&mut self, id: TaskId, target: Target, work: Work) -> NodeId {
        if let Some(existing) = self.index.get(&id) {
            debug!(task = %id, "task already defined; reusing node");
            return *existing;
        }

        let node = self.graph.add_node(TaskNode::new(id.clone(), target, work));
        self.index.insert(id, node);
        node
    }

    /// Declare that `node` depends on `dep`. Declaration order is kept.
    pub fn depends_on(&mut self, node: NodeId, dep: NodeId) -> &mut Self {
        if self.graph[node].deps.contains(&dep) {
            return self;
        }
        self.graph[node].deps.push(dep);
        self.graph.add_edge(dep, node, ());
        self
    }

    pub fn build(self) -> PipelineGraph {
        PipelineGraph { graph: self.graph }
    }
}

/// Immutable task graph for one invocation.
///
/// Built once, then shared by reference (or `Arc`) with the resolver and
/// the driver.
#[derive(Debug)]
pub struct PipelineGraph {
    graph: DiGraph<TaskNode, ()>,
}

impl PipelineGraph {
    pub fn node(&self, id: NodeId) -> &TaskNode {
        &self.graph[id]
    }

    /// First node (in insertion order) of the given kind.
    pub fn find_kind(&self, kind: &str) -> Option<NodeId> {
        self.node_ids().find(|n| self.graph[*n].id().kind() == kind)
    }

    /// All nodes in insertion order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.graph.node_indices()
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Direct dependencies in declaration order.
    pub fn dependencies_of(&self, id: NodeId) -> &[NodeId] {
        self.graph[id].dependencies()
    }

    /// Every node that transitively depends on `id`, excluding `id` itself.
    pub fn transitive_dependents(&self, id: NodeId) -> Vec<NodeId> {
        let mut dfs = Dfs::new(&self.graph, id);
        let mut out = Vec::new();
        while let Some(n) = dfs.next(&self.graph) {
            if n != id {
                out.push(n);
            }
        }
        out
    }

    /// Nodes nothing depends on, in insertion order.
    pub fn sinks(&self) -> Vec<NodeId> {
        self.node_ids()
            .filter(|n| {
                self.graph
                    .neighbors_directed(*n, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .collect()
    }

    /// Human-readable label for logs and reports.
    pub fn label(&self, id: NodeId) -> String {
        self.graph[id].id().to_string()
    }
}
