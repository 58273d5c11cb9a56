// tests/scheduler.rs
//
// The scheduler is synchronous and does no IO, so these tests drive it by
// hand without a runtime.

mod common;
use crate::common::{TestGraph, init_tracing};

use std::collections::HashSet;
use std::sync::Arc;

use batchdag::dag::{FailureCause, NodeState, RunOutcome, Scheduler, TaskNode, resolve_all};
use batchdag::errors::BatchdagError;

fn boom() -> RunOutcome {
    RunOutcome::Failed(Arc::new(BatchdagError::task_execution("A", "boom")))
}

#[test]
fn only_roots_are_ready_at_start() {
    init_tracing();
    let built = TestGraph::chain("unused", &["A", "B", "C"]).build();
    let order = resolve_all(&built.graph).unwrap();
    let mut scheduler = Scheduler::new(&built.graph, order);

    let step = scheduler.start(|_| false);

    assert_eq!(step.newly_scheduled, vec![built.node("A")]);
    assert!(!step.run_just_finished);
    assert!(matches!(scheduler.state_of(built.node("A")), Some(NodeState::Running)));
    assert!(matches!(scheduler.state_of(built.node("B")), Some(NodeState::Pending)));
}

#[test]
fn complete_nodes_are_short_circuited() {
    init_tracing();
    let built = TestGraph::chain("unused", &["A", "B", "C"]).build();
    let order = resolve_all(&built.graph).unwrap();
    let mut scheduler = Scheduler::new(&built.graph, order);

    let step = scheduler.start(|node: &TaskNode| node.id().kind() != "C");

    assert_eq!(step.newly_scheduled, vec![built.node("C")]);
    assert!(matches!(
        scheduler.state_of(built.node("A")),
        Some(NodeState::Done { executed: false })
    ));
}

#[test]
fn everything_complete_finishes_immediately() {
    let built = TestGraph::chain("unused", &["A", "B"]).build();
    let order = resolve_all(&built.graph).unwrap();
    let mut scheduler = Scheduler::new(&built.graph, order);

    let step = scheduler.start(|_| true);

    assert!(step.newly_scheduled.is_empty());
    assert!(step.run_just_finished);
    assert!(scheduler.is_finished());
}

#[test]
fn completion_releases_dependents_in_order() {
    init_tracing();
    let built = TestGraph::new("unused")
        .task("A")
        .task("B")
        .task("C")
        .edge("B", "A")
        .edge("C", "A")
        .build();
    let order = resolve_all(&built.graph).unwrap();
    let mut scheduler = Scheduler::new(&built.graph, order);
    scheduler.start(|_| false);

    let step = scheduler.handle_completion(built.node("A"), RunOutcome::Executed);

    assert_eq!(step.newly_scheduled, vec![built.node("B"), built.node("C")]);
    assert!(step.newly_failed.is_empty());
}

#[test]
fn failure_fails_transitive_dependents_only() {
    init_tracing();
    // A -> B -> C and X -> Y
    let built = TestGraph::chain("unused", &["A", "B", "C"])
        .task("X")
        .task("Y")
        .edge("Y", "X")
        .build();
    let order = resolve_all(&built.graph).unwrap();
    let mut scheduler = Scheduler::new(&built.graph, order);

    let first = scheduler.start(|_| false);
    let started: HashSet<_> = first.newly_scheduled.into_iter().collect();
    assert_eq!(started, HashSet::from([built.node("A"), built.node("X")]));

    let step = scheduler.handle_completion(built.node("A"), boom());
    let failed: HashSet<_> = step.newly_failed.into_iter().collect();
    assert_eq!(
        failed,
        HashSet::from([built.node("A"), built.node("B"), built.node("C")])
    );
    assert!(step.newly_scheduled.is_empty());

    match scheduler.state_of(built.node("C")) {
        Some(NodeState::Failed(FailureCause::UpstreamFailed { upstream })) => {
            assert!(upstream.starts_with("A["), "upstream = {upstream}");
        }
        other => panic!("expected UpstreamFailed, got {other:?}"),
    }

    let step = scheduler.handle_completion(built.node("X"), RunOutcome::Executed);
    assert_eq!(step.newly_scheduled, vec![built.node("Y")]);

    let step = scheduler.handle_completion(built.node("Y"), RunOutcome::Executed);
    assert!(step.run_just_finished);
}

#[test]
fn completion_for_non_running_node_is_ignored() {
    let built = TestGraph::chain("unused", &["A", "B"]).build();
    let order = resolve_all(&built.graph).unwrap();
    let mut scheduler = Scheduler::new(&built.graph, order);
    scheduler.start(|_| false);

    // B has not been scheduled yet.
    let step = scheduler.handle_completion(built.node("B"), RunOutcome::Executed);

    assert!(step.newly_scheduled.is_empty());
    assert!(matches!(scheduler.state_of(built.node("B")), Some(NodeState::Pending)));
}

#[test]
fn cancel_marks_running_and_pending_but_keeps_done() {
    init_tracing();
    let built = TestGraph::chain("unused", &["A", "B", "C"]).build();
    let order = resolve_all(&built.graph).unwrap();
    let mut scheduler = Scheduler::new(&built.graph, order);
    scheduler.start(|_| false);
    scheduler.handle_completion(built.node("A"), RunOutcome::Executed);

    let cancelled = scheduler.cancel_remaining();
    assert_eq!(cancelled.len(), 2);

    let states: Vec<_> = scheduler.into_states();
    assert!(matches!(states[0].1, NodeState::Done { executed: true }));
    assert!(matches!(states[1].1, NodeState::Failed(FailureCause::Cancelled)));
    assert!(matches!(
        states[2].1,
        NodeState::Failed(FailureCause::UpstreamFailed { .. })
    ));
}
