// src/exec/shell.rs

//! Cluster backend that runs job commands as local `sh -c` processes.
//!
//! Layout under `work_dir`:
//!
//! ```text
//! <work_dir>/pools/<pool_id>/jobs/<job_id>/   # job working directory
//! ```
//!
//! Resource files are copied from `share_root` into the job directory before
//! the first command runs. Commands run sequentially; the first non-zero
//! exit fails the job.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, anyhow};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::errors::{BatchdagError, Result};
use crate::exec::BoxFuture;
use crate::exec::backend::ClusterBackend;
use crate::exec::job::{ClusterCredentials, JobId, JobSpec, PoolSpec};
use crate::types::JobStatus;

/// Internal bookkeeping for one submitted job.
///
/// - `cancel` is used to kill the running command on explicit cancellation.
struct ActiveJob {
    status: JobStatus,
    cancel: Option<oneshot::Sender<()>>,
}

#[derive(Default)]
struct ClusterState {
    pools: HashSet<String>,
    jobs: HashMap<JobId, ActiveJob>,
}

#[derive(Clone)]
pub struct ShellCluster {
    work_dir: PathBuf,
    share_root: PathBuf,
    credentials: ClusterCredentials,
    state: Arc<Mutex<ClusterState>>,
    counter: Arc<AtomicU64>,
}

impl std::fmt::Debug for ShellCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShellCluster")
            .field("work_dir", &self.work_dir)
            .field("share_root", &self.share_root)
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl ShellCluster {
    pub fn new(
        work_dir: impl Into<PathBuf>,
        share_root: impl Into<PathBuf>,
        credentials: ClusterCredentials,
    ) -> Self {
        Self {
            work_dir: work_dir.into(),
            share_root: share_root.into(),
            credentials,
            state: Arc::new(Mutex::new(ClusterState::default())),
            counter: Arc::new(AtomicU64::new(0)),
        }
    }

    fn pool_dir(&self, pool_id: &str) -> PathBuf {
        self.work_dir.join("pools").join(pool_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ClusterState> {
        // A poisoned lock only means a runner panicked mid-update; the map
        // itself is still usable.
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn set_status(state: &Mutex<ClusterState>, job: &JobId, status: JobStatus) {
        let mut guard = state.lock().unwrap_or_else(|p| p.into_inner());
        if let Some(active) = guard.jobs.get_mut(job) {
            active.status = status;
        }
    }

    async fn ensure_pool_inner(&self, pool: &PoolSpec) -> Result<()> {
        let dir = self.pool_dir(&pool.pool_id);
        tokio::fs::create_dir_all(&dir).await?;

        let created = self.lock().pools.insert(pool.pool_id.clone());
        if created {
            info!(
                pool_id = %pool.pool_id,
                node_count = pool.node_count,
                vm_size = %pool.vm_size,
                "pool ready"
            );
        }
        Ok(())
    }

    async fn submit_inner(&self, spec: &JobSpec) -> Result<JobId> {
        let pool_known = self.lock().pools.contains(&spec.pool.pool_id);
        if !pool_known {
            return Err(BatchdagError::Submission {
                task: spec.task.clone(),
                message: format!("pool '{}' does not exist", spec.pool.pool_id),
            });
        }

        let seq = self.counter.fetch_add(1, Ordering::SeqCst);
        let job_id = JobId(format!("{}-{}", sanitize(&spec.task), seq));
        let job_dir = self
            .pool_dir(&spec.pool.pool_id)
            .join("jobs")
            .join(&job_id.0);
        tokio::fs::create_dir_all(&job_dir).await?;

        for remote in &spec.resource_files {
            stage_resource(&self.share_root, remote, &job_dir)
                .await
                .map_err(|e| BatchdagError::Submission {
                    task: spec.task.clone(),
                    message: format!("staging resource file '{remote}': {e:#}"),
                })?;
        }

        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();
        self.lock().jobs.insert(
            job_id.clone(),
            ActiveJob {
                status: JobStatus::Pending,
                cancel: Some(cancel_tx),
            },
        );

        let state = Arc::clone(&self.state);
        let commands = spec.commands.clone();
        let pool_id = spec.pool.pool_id.clone();
        let id = job_id.clone();

        tokio::spawn(async move {
            Self::set_status(&state, &id, JobStatus::Running);
            let status = match run_commands(&id, &pool_id, &commands, &job_dir, cancel_rx).await {
                Ok(status) => status,
                Err(err) => {
                    error!(job_id = %id, error = %err, "job runner error");
                    JobStatus::Failed
                }
            };
            Self::set_status(&state, &id, status);
            debug!(job_id = %id, %status, "job runner finished");
        });

        Ok(job_id)
    }

    fn poll_inner(&self, job: &JobId) -> Result<JobStatus> {
        self.lock()
            .jobs
            .get(job)
            .map(|j| j.status)
            .ok_or_else(|| anyhow!("unknown job '{job}'").into())
    }

    fn cancel_inner(&self, job: &JobId) -> Result<()> {
        let mut guard = self.lock();
        let active = guard
            .jobs
            .get_mut(job)
            .ok_or_else(|| anyhow!("unknown job '{job}'"))?;

        match active.cancel.take() {
            Some(tx) => {
                if tx.send(()).is_err() {
                    debug!(job_id = %job, "job already finished while cancelling");
                }
            }
            None => debug!(job_id = %job, "job was already cancelled"),
        }
        Ok(())
    }
}

impl ClusterBackend for ShellCluster {
    fn ensure_pool<'a>(&'a self, pool: &'a PoolSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(self.ensure_pool_inner(pool))
    }

    fn submit<'a>(&'a self, spec: &'a JobSpec) -> BoxFuture<'a, Result<JobId>> {
        Box::pin(self.submit_inner(spec))
    }

    fn poll<'a>(&'a self, job: &'a JobId) -> BoxFuture<'a, Result<JobStatus>> {
        Box::pin(async move { self.poll_inner(job) })
    }

    fn cancel<'a>(&'a self, job: &'a JobId) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move { self.cancel_inner(job) })
    }
}

fn sanitize(label: &str) -> String {
    label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

async fn stage_resource(share_root: &Path, remote: &str, job_dir: &Path) -> anyhow::Result<()> {
    let src = share_root.join(remote);
    let name = Path::new(remote)
        .file_name()
        .ok_or_else(|| anyhow!("resource path '{remote}' has no file name"))?;
    let dest = job_dir.join(name);
    tokio::fs::copy(&src, &dest)
        .await
        .with_context(|| format!("copying {:?} to {:?}", src, dest))?;
    debug!(src = ?src, dest = ?dest, "staged resource file");
    Ok(())
}

fn drain_lines<R>(job: JobId, stream: &'static str, reader: R)
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            debug!(job_id = %job, "{stream}: {line}");
        }
    });
}

/// Run each command in order; stop at the first failure or on cancellation.
async fn run_commands(
    job: &JobId,
    pool_id: &str,
    commands: &[String],
    job_dir: &Path,
    mut cancel_rx: oneshot::Receiver<()>,
) -> anyhow::Result<JobStatus> {
    let mut cancel_open = true;

    for (idx, line) in commands.iter().enumerate() {
        info!(job_id = %job, step = idx, cmd = %line, "starting job command");

        // Build a shell command appropriate for the platform.
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(line);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(line);
            c
        };

        cmd.current_dir(job_dir)
            .env("BATCHDAG_JOB_ID", &job.0)
            .env("BATCHDAG_POOL_ID", pool_id)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("spawning command {idx} of job '{job}'"))?;

        // Always consume output so buffers don't fill; log at debug.
        if let Some(stdout) = child.stdout.take() {
            drain_lines(job.clone(), "stdout", stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            drain_lines(job.clone(), "stderr", stderr);
        }

        tokio::select! {
            status_res = child.wait() => {
                let status = status_res
                    .with_context(|| format!("waiting for command {idx} of job '{job}'"))?;
                let code = status.code().unwrap_or(-1);
                if !status.success() {
                    warn!(job_id = %job, step = idx, exit_code = code, "job command failed");
                    return Ok(JobStatus::Failed);
                }
                debug!(job_id = %job, step = idx, "job command succeeded");
            }

            cancel = &mut cancel_rx, if cancel_open => {
                match cancel {
                    Ok(()) => {
                        info!(job_id = %job, step = idx, "cancellation requested; killing command");
                        if let Err(e) = child.kill().await {
                            warn!(job_id = %job, error = %e, "failed to kill command on cancellation");
                        }
                        return Ok(JobStatus::Failed);
                    }
                    Err(_) => {
                        // Sender dropped without cancelling; keep waiting.
                        cancel_open = false;
                        let status = child.wait().await?;
                        if !status.success() {
                            return Ok(JobStatus::Failed);
                        }
                    }
                }
            }
        }
    }

    Ok(JobStatus::Succeeded)
}
