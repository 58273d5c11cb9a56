// src/dag/node.rs

//! Task identity, per-node metadata and the work a node performs.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::dag::target::Target;
use crate::errors::Result;
use crate::exec::{JobSpec, LocalAction};

/// Index of a node inside a [`PipelineGraph`](crate::dag::PipelineGraph).
pub type NodeId = NodeIndex;

/// Number of hex digits of the parameter hash kept in a [`TaskId`].
const KEY_LEN: usize = 16;

/// Typed parameter set for one kind of task.
///
/// The serialized form (TOML, field order as declared) is hashed to derive
/// the task's key, so two instances with equal parameters are the same task.
pub trait TaskParams: Serialize {
    const KIND: &'static str;
}

/// Identity of a task: its kind plus a stable hash of its parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId {
    kind: String,
    key: String,
}

impl TaskId {
    /// Identity for a kind with an explicit parameter struct.
    pub fn new<P: Serialize + ?Sized>(kind: impl Into<String>, params: &P) -> Result<Self> {
        let kind = kind.into();
        let canonical = toml::to_string(params)
            .with_context(|| format!("serializing parameters of task kind '{kind}'"))?;
        Ok(Self::from_canonical(kind, &canonical))
    }

    pub fn of<P: TaskParams>(params: &P) -> Result<Self> {
        Self::new(P::KIND, params)
    }

    /// Identity for a task kind that takes no parameters.
    pub fn named(kind: impl Into<String>) -> Self {
        Self::from_canonical(kind.into(), "")
    }

    fn from_canonical(kind: String, canonical: &str) -> Self {
        let hex = blake3::hash(canonical.as_bytes()).to_hex();
        Self {
            kind,
            key: hex.as_str()[..KEY_LEN].to_string(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Deterministic marker file name, e.g. `PreProcessVideo_1f2e..._success`.
    pub fn marker_file_name(&self) -> String {
        format!("{}_{}_success", self.kind, self.key)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.kind, &self.key[..8])
    }
}

/// What running a node actually does.
#[derive(Debug, Clone)]
pub enum Work {
    /// In-process side effect, awaited inline.
    Local(Arc<dyn LocalAction>),
    /// Batch job dispatched to the cluster.
    Remote(JobSpec),
}

impl Work {
    pub fn is_remote(&self) -> bool {
        matches!(self, Work::Remote(_))
    }
}

/// Stored result of an already-completed dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyResult {
    pub task: TaskId,
    /// Marker payload written when the dependency succeeded.
    pub payload: String,
}

/// Input handed to a node's work when it runs.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub task: TaskId,
    pub deps: Vec<DependencyResult>,
}

impl RunContext {
    /// Payload of the first dependency of the given kind.
    pub fn payload_of(&self, kind: &str) -> Option<&str> {
        self.deps
            .iter()
            .find(|d| d.task.kind() == kind)
            .map(|d| d.payload.as_str())
    }
}

/// One pipeline stage: identity, ordered dependencies, marker and work.
///
/// Dependencies are filled in by [`GraphBuilder`](crate::dag::GraphBuilder)
/// and frozen once the graph is built.
#[derive(Debug, Clone)]
pub struct TaskNode {
    id: TaskId,
    target: Target,
    work: Work,
    pub(crate) deps: Vec<NodeId>,
}

impl TaskNode {
    pub fn new(id: TaskId, target: Target, work: Work) -> Self {
        Self {
            id,
            target,
            work,
            deps: Vec::new(),
        }
    }

    pub fn id(&self) -> &TaskId {
        &self.id
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    pub fn work(&self) -> &Work {
        &self.work
    }

    /// Direct dependencies in declaration order.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.deps
    }

    pub fn is_complete(&self) -> bool {
        self.target.exists()
    }
}
