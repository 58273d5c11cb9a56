// tests/property_resolver.rs

use std::collections::{HashMap, HashSet};

use batchdag::dag::{NodeId, PipelineGraph, resolve, resolve_all};
use batchdag_test_utils::{BuiltGraph, TestGraph};
use proptest::prelude::*;

// Acyclic by construction: task N may only depend on tasks 0..N-1.
fn dag_strategy(max_tasks: usize) -> impl Strategy<Value = Vec<Vec<usize>>> {
    (1..=max_tasks).prop_flat_map(|num_tasks| {
        proptest::collection::vec(
            proptest::collection::vec(any::<usize>(), 0..num_tasks),
            num_tasks,
        )
        .prop_map(|raw| {
            raw.into_iter()
                .enumerate()
                .map(|(i, deps)| {
                    let mut seen = HashSet::new();
                    deps.into_iter()
                        .filter(|_| i > 0)
                        .map(|d| d % i.max(1))
                        .filter(|d| seen.insert(*d))
                        .collect::<Vec<usize>>()
                })
                .collect::<Vec<Vec<usize>>>()
        })
    })
}

fn build(deps: &[Vec<usize>]) -> BuiltGraph {
    let mut graph = TestGraph::new("unused");
    for i in 0..deps.len() {
        graph = graph.task(&format!("task_{i}"));
    }
    for (i, list) in deps.iter().enumerate() {
        for d in list {
            graph = graph.edge(&format!("task_{i}"), &format!("task_{d}"));
        }
    }
    graph.build()
}

fn ancestors(graph: &PipelineGraph, root: NodeId) -> HashSet<NodeId> {
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(n) = stack.pop() {
        if seen.insert(n) {
            stack.extend(graph.dependencies_of(n).iter().copied());
        }
    }
    seen
}

fn assert_topological(graph: &PipelineGraph, order: &[NodeId]) {
    let position: HashMap<NodeId, usize> =
        order.iter().enumerate().map(|(i, n)| (*n, i)).collect();
    assert_eq!(position.len(), order.len(), "node listed twice in {order:?}");

    for node in order {
        for dep in graph.dependencies_of(*node) {
            let dep_pos = position
                .get(dep)
                .unwrap_or_else(|| panic!("dependency {dep:?} of {node:?} missing from order"));
            assert!(*dep_pos < position[node], "dependency ordered after dependent");
        }
    }
}

proptest! {
    #[test]
    fn resolve_all_is_a_topological_order(deps in dag_strategy(24)) {
        let built = build(&deps);
        let order = resolve_all(&built.graph).unwrap();

        prop_assert_eq!(order.len(), deps.len());
        assert_topological(&built.graph, &order);
    }

    #[test]
    fn resolve_covers_exactly_the_ancestors_of_root(deps in dag_strategy(24), pick in any::<usize>()) {
        let built = build(&deps);
        let root = built.node(&format!("task_{}", pick % deps.len()));

        let order = resolve(&built.graph, root).unwrap();

        prop_assert_eq!(order.last().copied(), Some(root));
        let got: HashSet<NodeId> = order.iter().copied().collect();
        prop_assert_eq!(got, ancestors(&built.graph, root));
        assert_topological(&built.graph, &order);
    }

    #[test]
    fn resolution_is_deterministic(deps in dag_strategy(16)) {
        let first = build(&deps);
        let second = build(&deps);

        prop_assert_eq!(resolve_all(&first.graph).unwrap(), resolve_all(&second.graph).unwrap());
    }
}
