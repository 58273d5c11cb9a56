// src/dag/state.rs

//! Per-run node states.

use std::fmt;
use std::sync::Arc;

use crate::errors::BatchdagError;

/// State of a node within one pipeline invocation.
#[derive(Debug, Clone)]
pub enum NodeState {
    /// Waiting on dependencies.
    Pending,
    /// Handed to a worker; at most one in-flight run per node.
    Running,
    /// Target exists. `executed` is false when the node was short-circuited
    /// because its marker was already present.
    Done { executed: bool },
    /// Terminal failure, with the originating cause.
    Failed(FailureCause),
}

impl NodeState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, NodeState::Done { .. } | NodeState::Failed(_))
    }

    pub fn is_done(&self) -> bool {
        matches!(self, NodeState::Done { .. })
    }
}

/// Why a node ended up `Failed`.
#[derive(Debug, Clone)]
pub enum FailureCause {
    /// The node's own work (or its target write) failed.
    Error(Arc<BatchdagError>),
    /// Never run because a dependency failed.
    UpstreamFailed { upstream: String },
    /// Aborted by a shutdown request.
    Cancelled,
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Error(err) => write!(f, "{err}"),
            FailureCause::UpstreamFailed { upstream } => {
                write!(f, "skipped: upstream task {upstream} failed")
            }
            FailureCause::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Result of one attempt to bring a node to completion, as reported by a
/// worker.
#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// Work ran and the target was written.
    Executed,
    /// The target appeared before the work started (or was written by
    /// someone else); nothing was executed.
    AlreadyComplete,
    Failed(Arc<BatchdagError>),
}
