// src/dag/scheduler_step.rs

//! Step-by-step result type for the scheduler.

use crate::dag::node::NodeId;

/// Structured result of a single scheduler "step".
///
/// Tests use it to step a run manually and assert on what changed.
#[derive(Debug, Clone, Default)]
pub struct SchedulerStep {
    /// Nodes that became ready (now `Running`) as a result of this step.
    pub newly_scheduled: Vec<NodeId>,
    /// Nodes newly marked `Failed` in this step, the failing node first,
    /// followed by its dependents.
    pub newly_failed: Vec<NodeId>,
    /// Whether every node is now terminal.
    pub run_just_finished: bool,
}

impl SchedulerStep {
    pub(crate) fn empty(run_finished: bool) -> Self {
        Self {
            run_just_finished: run_finished,
            ..Self::default()
        }
    }
}
