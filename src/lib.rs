// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod pipeline;
pub mod storage;
pub mod types;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{ConfigFile, load_from_path};
use crate::dag::{NodeId, PipelineGraph, Work, resolve};
use crate::engine::Driver;
use crate::exec::{ClusterBackend, JobProxy, ShellCluster};
use crate::pipeline::{VideoPipeline, build_video_pipeline};
use crate::storage::{SharedStorage, Storage};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (plus CLI overrides)
/// - storage and the shell cluster backend
/// - the video pipeline graph
/// - the driver, with Ctrl-C mapped to cancellation
///
/// Returns an error if any node of the run did not complete.
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let mut raw = load_from_path(&config_path)
        .with_context(|| format!("loading config from {}", config_path.display()))?;
    if let Some(suffix) = &args.resource_suffix {
        raw.video.resource_suffix = Some(suffix.clone());
    }
    let cfg = ConfigFile::try_from(raw)?;

    info!(
        pool_id = %cfg.cluster.pool.pool_id,
        resource_suffix = %cfg.video.resource_suffix,
        state_root = ?cfg.run.state_root,
        "configuration loaded"
    );
    debug!(credentials = ?cfg.cluster.credentials, "cluster credentials");

    let storage: Arc<dyn Storage> = Arc::new(SharedStorage::new(&cfg.cluster.share_root));
    let cluster: Arc<dyn ClusterBackend> = Arc::new(ShellCluster::new(
        &cfg.cluster.work_dir,
        &cfg.cluster.share_root,
        cfg.cluster.credentials.clone(),
    ));

    let pipeline = build_video_pipeline(&cfg, Arc::clone(&storage), Arc::clone(&cluster))?;
    let root = pipeline.node_for(args.stage)?;

    if args.dry_run {
        print_dry_run(&pipeline, &args, root)?;
        return Ok(());
    }

    invalidate(&pipeline, &args)?;

    // Ctrl-C → cancellation.
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl+C");
            return;
        }
        let _ = shutdown_tx.send(true);
    });

    let proxy = JobProxy::new(cluster, storage, cfg.run.proxy_options());
    let (graph, _) = pipeline.into_parts();
    let driver = Driver::new(Arc::new(graph), proxy).with_shutdown(shutdown_rx);

    let report = driver.run(root).await?;
    println!("batchdag report:");
    print!("{report}");

    if !report.is_success() {
        bail!(
            "{} task(s) did not complete; rerun to resume",
            report.failures().count()
        );
    }
    Ok(())
}

/// Delete markers of the stages named by `--invalidate`.
fn invalidate(pipeline: &VideoPipeline, args: &CliArgs) -> Result<()> {
    for stage in &args.invalidate {
        let node = pipeline.node_for(*stage)?;
        let target = pipeline.graph.node(node).target();
        if target.remove()? {
            info!(stage = ?stage, path = ?target.path(), "marker removed");
        } else {
            debug!(stage = ?stage, path = ?target.path(), "no marker to remove");
        }
    }
    Ok(())
}

/// Print the resolved order with marker state and work, then exit.
fn print_dry_run(pipeline: &VideoPipeline, args: &CliArgs, root: NodeId) -> Result<()> {
    let graph: &PipelineGraph = &pipeline.graph;
    let order = resolve(graph, root)?;

    println!("batchdag dry-run");
    println!("  stage = {:?}", args.stage);
    for stage in &args.invalidate {
        println!("  would invalidate {stage:?}");
    }
    println!();

    println!("order ({}):", order.len());
    for node in order {
        let task = graph.node(node);
        let state = if task.is_complete() { "complete" } else { "pending" };
        println!("  - {} [{state}]", task.id());
        println!("      marker: {}", task.target().path().display());

        let deps: Vec<String> = task
            .dependencies()
            .iter()
            .map(|d| graph.label(*d))
            .collect();
        if !deps.is_empty() {
            println!("      after: {deps:?}");
        }

        match task.work() {
            Work::Local(action) => println!("      local: {action:?}"),
            Work::Remote(spec) => {
                println!("      pool: {}", spec.pool.pool_id);
                for cmd in &spec.commands {
                    println!("      cmd: {cmd}");
                }
            }
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
