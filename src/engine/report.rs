// src/engine/report.rs

use std::fmt;
use std::path::PathBuf;

use crate::dag::{NodeState, TaskId, TaskNode};

/// Final state of one node after a run.
#[derive(Debug, Clone)]
pub struct NodeReport {
    pub task: TaskId,
    pub target: PathBuf,
    pub state: NodeState,
}

impl NodeReport {
    pub fn new(node: &TaskNode, state: NodeState) -> Self {
        Self {
            task: node.id().clone(),
            target: node.target().path().to_path_buf(),
            state,
        }
    }
}

/// Outcome of one pipeline invocation, in resolved order.
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    nodes: Vec<NodeReport>,
}

impl PipelineReport {
    pub fn new(nodes: Vec<NodeReport>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[NodeReport] {
        &self.nodes
    }

    /// Every node in the run reached `Done`.
    pub fn is_success(&self) -> bool {
        self.nodes.iter().all(|n| n.state.is_done())
    }

    /// Tasks whose work actually ran (as opposed to being short-circuited).
    pub fn executed(&self) -> Vec<&TaskId> {
        self.nodes
            .iter()
            .filter(|n| matches!(n.state, NodeState::Done { executed: true }))
            .map(|n| &n.task)
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &NodeReport> {
        self.nodes.iter().filter(|n| !n.state.is_done())
    }

    pub fn state_of(&self, task: &TaskId) -> Option<&NodeState> {
        self.nodes.iter().find(|n| &n.task == task).map(|n| &n.state)
    }

    /// State of the first node of the given kind.
    pub fn state_of_kind(&self, kind: &str) -> Option<&NodeState> {
        self.nodes
            .iter()
            .find(|n| n.task.kind() == kind)
            .map(|n| &n.state)
    }
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            match &node.state {
                NodeState::Done { executed: true } => writeln!(f, "  [done]     {}", node.task)?,
                NodeState::Done { executed: false } => {
                    writeln!(f, "  [complete] {}", node.task)?
                }
                NodeState::Failed(cause) => writeln!(f, "  [failed]   {}: {cause}", node.task)?,
                NodeState::Pending | NodeState::Running => {
                    writeln!(f, "  [not run]  {}", node.task)?
                }
            }
        }
        Ok(())
    }
}
