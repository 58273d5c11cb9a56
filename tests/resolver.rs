// tests/resolver.rs

mod common;
use crate::common::{TestGraph, TestResult, init_tracing};

use std::sync::Arc;

use batchdag::dag::{GraphBuilder, TaskId, Work, resolve, resolve_all};
use batchdag::errors::BatchdagError;
use batchdag_test_utils::{RecordingAction, new_log};

fn labels(graph: &batchdag::dag::PipelineGraph, order: &[batchdag::dag::NodeId]) -> Vec<String> {
    order
        .iter()
        .map(|n| graph.node(*n).id().kind().to_string())
        .collect()
}

#[test]
fn chain_resolves_dependencies_first() -> TestResult {
    init_tracing();
    let built = TestGraph::chain("unused", &["A", "B", "C"]).build();

    let order = resolve(&built.graph, built.node("C"))?;
    assert_eq!(labels(&built.graph, &order), vec!["A", "B", "C"]);
    Ok(())
}

#[test]
fn diamond_is_deterministic_in_declaration_order() -> TestResult {
    init_tracing();
    // D needs C then B; both need A.
    let built = TestGraph::new("unused")
        .task("A")
        .task("B")
        .task("C")
        .task("D")
        .edge("B", "A")
        .edge("C", "A")
        .edge("D", "C")
        .edge("D", "B")
        .build();

    let first = resolve(&built.graph, built.node("D"))?;
    let second = resolve(&built.graph, built.node("D"))?;

    assert_eq!(first, second);
    assert_eq!(labels(&built.graph, &first), vec!["A", "C", "B", "D"]);
    Ok(())
}

#[test]
fn resolving_from_a_middle_node_excludes_dependents() -> TestResult {
    let built = TestGraph::chain("unused", &["A", "B", "C"]).build();

    let order = resolve(&built.graph, built.node("B"))?;
    assert_eq!(labels(&built.graph, &order), vec!["A", "B"]);
    Ok(())
}

#[test]
fn two_node_cycle_is_rejected_with_path() -> TestResult {
    init_tracing();
    let built = TestGraph::new("unused")
        .task("A")
        .task("B")
        .edge("A", "B")
        .edge("B", "A")
        .build();

    let err = resolve(&built.graph, built.node("A")).unwrap_err();
    match err {
        BatchdagError::CyclicDependency { cycle } => {
            assert_eq!(cycle.len(), 3, "cycle: {cycle:?}");
            assert_eq!(cycle.first(), cycle.last());
            assert!(cycle[0].starts_with("A["));
            assert!(cycle[1].starts_with("B["));
        }
        other => panic!("expected CyclicDependency, got {other:?}"),
    }
    Ok(())
}

#[test]
fn self_loop_is_a_cycle() {
    let built = TestGraph::new("unused").task("A").edge("A", "A").build();

    let err = resolve(&built.graph, built.node("A")).unwrap_err();
    assert!(
        matches!(&err, BatchdagError::CyclicDependency { cycle } if cycle.len() == 2),
        "got {err:?}"
    );
    assert!(err.to_string().starts_with("Cycle detected in task graph"));
}

#[test]
fn resolve_all_finds_cycles_without_sinks() {
    // Every node sits on the cycle, so there is no sink to start from.
    let built = TestGraph::new("unused")
        .task("A")
        .task("B")
        .task("C")
        .edge("A", "C")
        .edge("B", "A")
        .edge("C", "B")
        .build();

    let err = resolve_all(&built.graph).unwrap_err();
    assert!(matches!(err, BatchdagError::CyclicDependency { .. }));
}

#[test]
fn resolve_all_covers_disconnected_chains() -> TestResult {
    let built = TestGraph::chain("unused", &["A", "B"])
        .task("X")
        .task("Y")
        .edge("Y", "X")
        .build();

    let order = resolve_all(&built.graph)?;
    assert_eq!(labels(&built.graph, &order), vec!["A", "B", "X", "Y"]);
    Ok(())
}

#[test]
fn same_kind_and_params_is_the_same_node() -> TestResult {
    #[derive(serde::Serialize)]
    struct Params {
        pool_id: String,
    }

    let log = new_log();
    let mut builder = GraphBuilder::new("unused");
    let params = Params {
        pool_id: "pool-1".to_string(),
    };

    let first = builder.add_task(
        TaskId::new("PreparePool", &params)?,
        Work::Local(Arc::new(RecordingAction::new("first", Arc::clone(&log)))),
    );
    let again = builder.add_task(
        TaskId::new("PreparePool", &params)?,
        Work::Local(Arc::new(RecordingAction::new("again", Arc::clone(&log)))),
    );
    let other = builder.add_task(
        TaskId::new(
            "PreparePool",
            &Params {
                pool_id: "pool-2".to_string(),
            },
        )?,
        Work::Local(Arc::new(RecordingAction::new("other", log))),
    );

    assert_eq!(first, again);
    assert_ne!(first, other);
    assert_eq!(builder.build().len(), 2);
    Ok(())
}

#[test]
fn marker_names_are_stable() -> TestResult {
    #[derive(serde::Serialize)]
    struct Params {
        pool_id: String,
        node_count: u32,
    }
    let params = Params {
        pool_id: "AzureBatch-Pool-Id-17".to_string(),
        node_count: 2,
    };

    let a = TaskId::new("PreparePool", &params)?;
    let b = TaskId::new("PreparePool", &params)?;

    assert_eq!(a, b);
    assert_eq!(a.key().len(), 16);
    assert_eq!(a.marker_file_name(), format!("PreparePool_{}_success", a.key()));
    assert_ne!(a.key(), TaskId::named("PreparePool").key());
    Ok(())
}
