// src/engine/driver.rs

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::io;
use std::sync::Arc;

use anyhow::anyhow;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::dag::{
    DependencyResult, NodeId, PipelineGraph, RunContext, RunOutcome, Scheduler, TaskNode,
    resolve, resolve_all,
};
use crate::engine::report::{NodeReport, PipelineReport};
use crate::errors::{BatchdagError, Result};
use crate::exec::JobProxy;

/// Walks a resolved order, running each node once its dependencies are done.
///
/// This is the async IO shell around [`Scheduler`], which holds all the
/// per-run semantics. The driver:
/// - spawns one Tokio task per ready node (independent branches run in
///   parallel)
/// - feeds worker results back into the scheduler
/// - reacts to a shutdown signal by aborting in-flight workers
///
/// Scheduler state never leaves the driver loop, so no lock is held while a
/// worker waits on a remote job.
pub struct Driver {
    graph: Arc<PipelineGraph>,
    proxy: Arc<JobProxy>,
    shutdown: Option<watch::Receiver<bool>>,
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("nodes", &self.graph.len())
            .field("proxy", &self.proxy)
            .finish_non_exhaustive()
    }
}

impl Driver {
    pub fn new(graph: Arc<PipelineGraph>, proxy: JobProxy) -> Self {
        Self {
            graph,
            proxy: Arc::new(proxy),
            shutdown: None,
        }
    }

    /// Abort the run once the channel carries `true`.
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    pub fn graph(&self) -> &PipelineGraph {
        &self.graph
    }

    /// Run everything `root` requires. Fails before executing anything if
    /// the graph has a cycle.
    pub async fn run(&self, root: NodeId) -> Result<PipelineReport> {
        let order = resolve(&self.graph, root)?;
        self.run_order(order).await
    }

    /// Run the whole graph.
    pub async fn run_all(&self) -> Result<PipelineReport> {
        let order = resolve_all(&self.graph)?;
        self.run_order(order).await
    }

    async fn run_order(&self, order: Vec<NodeId>) -> Result<PipelineReport> {
        info!(nodes = order.len(), "pipeline run started");

        let mut scheduler = Scheduler::new(&self.graph, order);
        let first = scheduler.start(TaskNode::is_complete);

        let mut workers: JoinSet<(NodeId, RunOutcome)> = JoinSet::new();
        let mut guard = ExecutionGuard::default();
        self.spawn_ready(first.newly_scheduled, &mut workers, &mut guard);

        let mut shutdown = self.shutdown.clone();

        while !workers.is_empty() {
            let joined = tokio::select! {
                joined = workers.join_next_with_id() => joined,
                _ = shutdown_requested(&mut shutdown) => {
                    warn!(
                        in_flight = guard.len(),
                        "shutdown requested; aborting in-flight tasks (remote jobs are left running)"
                    );
                    workers.abort_all();
                    let cancelled = scheduler.cancel_remaining();
                    debug!(count = cancelled.len(), "nodes marked cancelled");
                    break;
                }
            };

            let (node, outcome) = match joined {
                Some(Ok((_, (node, outcome)))) => {
                    guard.release_node(node);
                    (node, outcome)
                }
                Some(Err(join_err)) => {
                    let Some(node) = guard.release_task(join_err.id()) else {
                        error!(error = %join_err, "worker for unknown node failed");
                        continue;
                    };
                    error!(task = %self.graph.label(node), error = %join_err, "worker panicked");
                    let err = BatchdagError::Other(anyhow!("worker panicked: {join_err}"));
                    (node, RunOutcome::Failed(Arc::new(err)))
                }
                None => break,
            };

            let step = scheduler.handle_completion(node, outcome);
            self.spawn_ready(step.newly_scheduled, &mut workers, &mut guard);
        }

        let report = PipelineReport::new(
            scheduler
                .into_states()
                .into_iter()
                .map(|(node, state)| NodeReport::new(self.graph.node(node), state))
                .collect(),
        );

        info!(
            succeeded = report.is_success(),
            executed = report.executed().len(),
            failed = report.failures().count(),
            "pipeline run finished"
        );
        Ok(report)
    }

    fn spawn_ready(
        &self,
        nodes: Vec<NodeId>,
        workers: &mut JoinSet<(NodeId, RunOutcome)>,
        guard: &mut ExecutionGuard,
    ) {
        for node in nodes {
            if guard.is_in_flight(node) {
                error!(task = %self.graph.label(node), "node already in flight; refusing duplicate run");
                continue;
            }

            let graph = Arc::clone(&self.graph);
            let proxy = Arc::clone(&self.proxy);
            let handle = workers.spawn(async move {
                let outcome = run_node(&graph, &proxy, node).await;
                (node, outcome)
            });
            guard.admit(node, handle.id());
        }
    }
}

/// At most one in-flight run per node.
#[derive(Debug, Default)]
struct ExecutionGuard {
    nodes: HashSet<NodeId>,
    tasks: HashMap<tokio::task::Id, NodeId>,
}

impl ExecutionGuard {
    fn is_in_flight(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    fn admit(&mut self, node: NodeId, task: tokio::task::Id) {
        self.nodes.insert(node);
        self.tasks.insert(task, node);
    }

    fn release_node(&mut self, node: NodeId) {
        self.nodes.remove(&node);
        self.tasks.retain(|_, n| *n != node);
    }

    fn release_task(&mut self, task: tokio::task::Id) -> Option<NodeId> {
        let node = self.tasks.remove(&task)?;
        self.nodes.remove(&node);
        Some(node)
    }

    fn len(&self) -> usize {
        self.nodes.len()
    }
}

async fn shutdown_requested(rx: &mut Option<watch::Receiver<bool>>) {
    let Some(rx) = rx else {
        return std::future::pending().await;
    };
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without requesting shutdown.
            return std::future::pending().await;
        }
    }
}

/// Bring one node to completion: re-check its target, run its work, write
/// the target, and check again.
async fn run_node(graph: &PipelineGraph, proxy: &JobProxy, node: NodeId) -> RunOutcome {
    let task = graph.node(node);

    if task.is_complete() {
        return RunOutcome::AlreadyComplete;
    }

    let ctx = match dependency_context(graph, node).await {
        Ok(ctx) => ctx,
        Err(err) => return RunOutcome::Failed(Arc::new(err)),
    };

    info!(task = %task.id(), remote = task.work().is_remote(), "running task");

    let payload = match proxy.execute(task, &ctx).await {
        Ok(payload) => payload,
        Err(err) => return RunOutcome::Failed(Arc::new(err)),
    };

    let target = task.target().clone();
    match blocking(move || target.write_payload(&payload)).await {
        Ok(()) => {}
        Err(BatchdagError::AlreadyExists(path)) => {
            warn!(task = %task.id(), path = ?path, "target appeared while task was running; keeping existing marker");
        }
        Err(err) => return RunOutcome::Failed(Arc::new(err)),
    }

    if !task.is_complete() {
        let err = io::Error::new(
            io::ErrorKind::NotFound,
            format!("target {:?} missing after write", task.target().path()),
        );
        return RunOutcome::Failed(Arc::new(err.into()));
    }

    RunOutcome::Executed
}

/// Payloads of a node's (already complete) dependencies.
async fn dependency_context(graph: &PipelineGraph, node: NodeId) -> Result<RunContext> {
    let task = graph.node(node);
    let targets: Vec<_> = task
        .dependencies()
        .iter()
        .map(|dep| {
            let dep_node = graph.node(*dep);
            (dep_node.id().clone(), dep_node.target().clone())
        })
        .collect();

    let deps = blocking(move || {
        targets
            .into_iter()
            .map(|(task, target)| {
                Ok(DependencyResult {
                    task,
                    payload: target.read()?,
                })
            })
            .collect::<Result<Vec<_>>>()
    })
    .await?;

    Ok(RunContext {
        task: task.id().clone(),
        deps,
    })
}

/// Marker IO syncs to disk; keep it off the async workers.
async fn blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BatchdagError::Other(anyhow!("marker IO task failed: {e}")))?
}
