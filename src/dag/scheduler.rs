use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::dag::graph::PipelineGraph;
use crate::dag::node::{NodeId, TaskNode};
use crate::dag::scheduler_step::SchedulerStep;
use crate::dag::state::{FailureCause, NodeState, RunOutcome};

/// Per-run state machine over a resolved order.
///
/// It is responsible for:
/// - short-circuiting nodes whose targets already exist
/// - deciding when a pending node is ready (all deps `Done`)
/// - marking nodes done/failed as workers report back
/// - failing every transitive dependent of a failed node
///
/// It performs no IO and never awaits; the driver owns it exclusively.
#[derive(Debug)]
pub struct Scheduler<'g> {
    graph: &'g PipelineGraph,
    order: Vec<NodeId>,
    states: HashMap<NodeId, NodeState>,
}

impl<'g> Scheduler<'g> {
    pub fn new(graph: &'g PipelineGraph, order: Vec<NodeId>) -> Self {
        let states = order.iter().map(|n| (*n, NodeState::Pending)).collect();
        Self {
            graph,
            order,
            states,
        }
    }

    /// Mark already-complete nodes `Done` and return the first ready batch.
    pub fn start<F>(&mut self, is_complete: F) -> SchedulerStep
    where
        F: Fn(&TaskNode) -> bool,
    {
        for node in self.order.clone() {
            if is_complete(self.graph.node(node)) {
                debug!(task = %self.graph.label(node), "target exists; short-circuiting");
                self.states.insert(node, NodeState::Done { executed: false });
            }
        }

        let newly_scheduled = self.collect_ready();
        SchedulerStep {
            newly_scheduled,
            newly_failed: Vec::new(),
            run_just_finished: self.is_finished(),
        }
    }

    pub fn state_of(&self, node: NodeId) -> Option<&NodeState> {
        self.states.get(&node)
    }

    /// Resolved order this run walks.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// True once every node is `Done` or `Failed`.
    pub fn is_finished(&self) -> bool {
        self.states.values().all(NodeState::is_terminal)
    }

    /// Whether every dependency of `node` is `Done` in this run.
    pub fn deps_satisfied(&self, node: NodeId) -> bool {
        self.graph
            .dependencies_of(node)
            .iter()
            .all(|dep| matches!(self.states.get(dep), Some(NodeState::Done { .. })))
    }

    /// Record a worker's report for a running node.
    pub fn handle_completion(&mut self, node: NodeId, outcome: RunOutcome) -> SchedulerStep {
        let label = self.graph.label(node);

        match self.states.get(&node) {
            Some(NodeState::Running) => {}
            other => {
                warn!(task = %label, state = ?other, "completion for node that is not running; ignoring");
                return SchedulerStep::empty(self.is_finished());
            }
        }

        let mut newly_failed = Vec::new();
        let newly_scheduled = match outcome {
            RunOutcome::Executed => {
                info!(task = %label, "task completed");
                self.states.insert(node, NodeState::Done { executed: true });
                self.collect_ready()
            }
            RunOutcome::AlreadyComplete => {
                info!(task = %label, "task found complete before running");
                self.states.insert(node, NodeState::Done { executed: false });
                self.collect_ready()
            }
            RunOutcome::Failed(err) => {
                warn!(task = %label, error = %err, "task failed; failing dependents");
                self.states
                    .insert(node, NodeState::Failed(FailureCause::Error(err)));
                newly_failed.push(node);
                newly_failed.extend(self.mark_dependents_failed(node));
                // Independent branches may still have work.
                self.collect_ready()
            }
        };

        SchedulerStep {
            newly_scheduled,
            newly_failed,
            run_just_finished: self.is_finished(),
        }
    }

    /// Fail everything that is still pending or running.
    ///
    /// Running nodes become `Cancelled`; their dependents become
    /// `UpstreamFailed`; anything else left pending is `Cancelled` too.
    /// `Done` nodes are untouched.
    pub fn cancel_remaining(&mut self) -> Vec<NodeId> {
        let mut newly_failed = Vec::new();

        let running: Vec<NodeId> = self
            .order
            .iter()
            .copied()
            .filter(|n| matches!(self.states.get(n), Some(NodeState::Running)))
            .collect();

        for node in running {
            self.states
                .insert(node, NodeState::Failed(FailureCause::Cancelled));
            newly_failed.push(node);
            newly_failed.extend(self.mark_dependents_failed(node));
        }

        for node in self.order.clone() {
            if matches!(self.states.get(&node), Some(NodeState::Pending)) {
                self.states
                    .insert(node, NodeState::Failed(FailureCause::Cancelled));
                newly_failed.push(node);
            }
        }

        newly_failed
    }

    /// Consume the scheduler, yielding `(node, state)` in resolved order.
    pub fn into_states(mut self) -> Vec<(NodeId, NodeState)> {
        self.order
            .iter()
            .map(|n| {
                let state = self.states.remove(n).unwrap_or(NodeState::Pending);
                (*n, state)
            })
            .collect()
    }

    /// Pending nodes whose dependencies are all `Done`, in resolved order,
    /// transitioned to `Running`.
    fn collect_ready(&mut self) -> Vec<NodeId> {
        let ready: Vec<NodeId> = self
            .order
            .iter()
            .copied()
            .filter(|n| matches!(self.states.get(n), Some(NodeState::Pending)))
            .filter(|n| self.deps_satisfied(*n))
            .collect();

        for node in &ready {
            debug!(task = %self.graph.label(*node), "dependencies satisfied; marking Running");
            self.states.insert(*node, NodeState::Running);
        }

        ready
    }

    /// Fail all pending/running transitive dependents of `failed`.
    fn mark_dependents_failed(&mut self, failed: NodeId) -> Vec<NodeId> {
        let upstream = self.graph.label(failed);
        let mut newly_failed = Vec::new();

        for node in self.graph.transitive_dependents(failed) {
            if let Some(state) = self.states.get_mut(&node) {
                if matches!(state, NodeState::Pending | NodeState::Running) {
                    debug!(
                        task = %self.graph.label(node),
                        upstream = %upstream,
                        "marking dependent Failed due to upstream failure"
                    );
                    *state = NodeState::Failed(FailureCause::UpstreamFailed {
                        upstream: upstream.clone(),
                    });
                    newly_failed.push(node);
                }
            }
        }

        newly_failed
    }
}
