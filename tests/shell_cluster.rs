// tests/shell_cluster.rs
#![cfg(unix)]

mod common;
use crate::common::{TestResult, fast_options, init_tracing, with_timeout};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use batchdag::dag::TaskId;
use batchdag::errors::BatchdagError;
use batchdag::exec::{
    ClusterBackend, ClusterCredentials, JobProxy, JobSpec, PoolSpec, ShellCluster,
};
use batchdag::pipeline::params::PreProcessVideoParams;
use batchdag::pipeline::stages::preprocess_job;
use batchdag::storage::{MemoryStorage, Storage};
use batchdag::types::JobStatus;
use tempfile::tempdir;

fn pool() -> PoolSpec {
    PoolSpec {
        pool_id: "pool-a".to_string(),
        node_count: 1,
        vm_size: "local".to_string(),
    }
}

fn job(task: &str, commands: &[&str]) -> JobSpec {
    JobSpec {
        task: task.to_string(),
        commands: commands.iter().map(|c| c.to_string()).collect(),
        pool: pool(),
        inputs: Vec::new(),
        resource_files: Vec::new(),
    }
}

fn cluster_in(root: &Path) -> Arc<ShellCluster> {
    Arc::new(ShellCluster::new(
        root.join("cluster"),
        root.join("share"),
        ClusterCredentials::default(),
    ))
}

fn proxy_for(cluster: &Arc<ShellCluster>) -> JobProxy {
    let cluster: Arc<dyn ClusterBackend> = Arc::clone(cluster) as Arc<dyn ClusterBackend>;
    let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
    JobProxy::new(cluster, storage, fast_options())
}

async fn run_to_end(cluster: &Arc<ShellCluster>, spec: &JobSpec) -> batchdag::errors::Result<JobStatus> {
    let proxy = proxy_for(cluster);
    let mut handle = proxy.submit(&TaskId::named(&spec.task), spec).await?;
    let result = proxy
        .await_terminal(&mut handle, Duration::from_millis(10), Duration::from_secs(4))
        .await?;
    Ok(result.status)
}

#[tokio::test]
async fn successful_commands_reach_succeeded() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cluster = cluster_in(dir.path());
    cluster.ensure_pool(&pool()).await?;

    let spec = job(
        "Ok",
        &["echo hello > out.txt", "test -n \"$BATCHDAG_JOB_ID\"", "test \"$BATCHDAG_POOL_ID\" = pool-a"],
    );
    let status = with_timeout(run_to_end(&cluster, &spec)).await?;

    assert_eq!(status, JobStatus::Succeeded);
    assert!(dir.path().join("cluster/pools/pool-a/jobs").is_dir());
    Ok(())
}

#[tokio::test]
async fn first_failing_command_fails_the_job() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let marker = dir.path().join("never");
    let cluster = cluster_in(dir.path());
    cluster.ensure_pool(&pool()).await?;

    let touch = format!("touch {}", marker.display());
    let spec = job("Bad", &["true", "false", &touch]);
    let status = with_timeout(run_to_end(&cluster, &spec)).await?;

    assert_eq!(status, JobStatus::Failed);
    assert!(!marker.exists(), "commands after the failure must not run");
    Ok(())
}

#[tokio::test]
async fn unknown_pool_is_rejected_at_submit() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cluster = cluster_in(dir.path());

    let err = cluster.submit(&job("NoPool", &["true"])).await.unwrap_err();
    assert!(matches!(err, BatchdagError::Submission { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn resource_files_are_staged_into_the_job_dir() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    std::fs::create_dir_all(dir.path().join("share/models"))?;
    std::fs::write(dir.path().join("share/models/artifacts.tar.gz"), b"archive")?;

    let cluster = cluster_in(dir.path());
    cluster.ensure_pool(&pool()).await?;

    let mut spec = job("Stage", &["test -f artifacts.tar.gz"]);
    spec.resource_files.push("models/artifacts.tar.gz".to_string());

    let status = with_timeout(run_to_end(&cluster, &spec)).await?;
    assert_eq!(status, JobStatus::Succeeded);
    Ok(())
}

#[tokio::test]
async fn missing_resource_file_is_a_submission_error() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cluster = cluster_in(dir.path());
    cluster.ensure_pool(&pool()).await?;

    let mut spec = job("Stage", &["true"]);
    spec.resource_files.push("models/missing.tar.gz".to_string());

    let err = cluster.submit(&spec).await.unwrap_err();
    assert!(matches!(err, BatchdagError::Submission { .. }), "got {err:?}");
    Ok(())
}

#[tokio::test]
async fn cancel_kills_a_running_job() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cluster = cluster_in(dir.path());
    cluster.ensure_pool(&pool()).await?;

    let job_id = cluster.submit(&job("Slow", &["sleep 30"])).await?;

    with_timeout(async {
        while cluster.poll(&job_id).await.unwrap() != JobStatus::Running {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;

    cluster.cancel(&job_id).await?;

    let status = with_timeout(async {
        loop {
            let status = cluster.poll(&job_id).await.unwrap();
            if status.is_terminal() {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await;
    assert_eq!(status, JobStatus::Failed);
    Ok(())
}

/// The preprocess job with `ffmpeg` swapped for `tool`, keeping every
/// redirect and argument as generated.
fn preprocess_with(root: &Path, tool: &str) -> std::io::Result<JobSpec> {
    std::fs::create_dir_all(root.join("share"))?;
    std::fs::write(root.join("share/clip.mp4"), b"video")?;
    std::fs::write(root.join("clip.mp4"), b"video")?;

    let params = PreProcessVideoParams {
        pool_id: "pool-a".to_string(),
        mount: root.join("share").display().to_string(),
        resource_suffix: "2024010112".to_string(),
        file_name: "clip.mp4".to_string(),
    };
    let mut spec = preprocess_job(&params, &pool(), &root.join("clip.mp4"));
    for cmd in &mut spec.commands {
        *cmd = cmd.replace("ffmpeg ", &format!("{tool} "));
    }
    Ok(spec)
}

#[tokio::test]
async fn failing_preprocess_step_fails_the_job() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cluster = cluster_in(dir.path());
    cluster.ensure_pool(&pool()).await?;

    let spec = preprocess_with(dir.path(), "false")?;
    let status = with_timeout(run_to_end(&cluster, &spec)).await?;

    assert_eq!(status, JobStatus::Failed);
    Ok(())
}

#[tokio::test]
async fn passing_preprocess_steps_succeed() -> TestResult {
    init_tracing();
    let dir = tempdir()?;
    let cluster = cluster_in(dir.path());
    cluster.ensure_pool(&pool()).await?;

    let spec = preprocess_with(dir.path(), "true")?;
    let status = with_timeout(run_to_end(&cluster, &spec)).await?;

    assert_eq!(status, JobStatus::Succeeded);
    assert!(dir.path().join("share/audio2024010112").is_dir());
    assert!(dir.path().join("share/images2024010112").is_dir());
    Ok(())
}

#[test]
fn credentials_debug_redacts_keys() {
    let creds = ClusterCredentials {
        account_name: Some("acct".to_string()),
        account_key: Some("super-secret".to_string()),
        account_url: None,
        storage_account_name: None,
        storage_account_key: Some("also-secret".to_string()),
    };
    let cluster = ShellCluster::new("work", "share", creds);

    let rendered = format!("{cluster:?}");
    assert!(rendered.contains("acct"));
    assert!(!rendered.contains("super-secret"));
    assert!(!rendered.contains("also-secret"));
}
