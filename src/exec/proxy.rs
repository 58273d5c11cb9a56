// src/exec/proxy.rs

//! Runs a node's work: local actions inline, remote work as a batch job.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, info, warn};

use crate::dag::{RunContext, TaskId, TaskNode, Work};
use crate::errors::{BatchdagError, Result};
use crate::exec::backend::{ClusterBackend, LocalAction};
use crate::exec::job::{JobHandle, JobResult, JobSpec};
use crate::exec::retry::RetryPolicy;
use crate::storage::Storage;
use crate::types::JobStatus;

/// Timing knobs for remote jobs.
#[derive(Debug, Clone, Copy)]
pub struct ProxyOptions {
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    /// Applies to submissions and to retry-safe local actions.
    pub retry: RetryPolicy,
}

impl Default for ProxyOptions {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            job_timeout: Duration::from_secs(2 * 60 * 60),
            retry: RetryPolicy::default(),
        }
    }
}

/// Dispatches node work and owns every [`JobHandle`] it creates.
///
/// Shared between worker tasks behind an `Arc`; it holds no per-run state,
/// so independent nodes can wait on their jobs concurrently.
#[derive(Debug, Clone)]
pub struct JobProxy {
    cluster: Arc<dyn ClusterBackend>,
    storage: Arc<dyn Storage>,
    options: ProxyOptions,
}

impl JobProxy {
    pub fn new(
        cluster: Arc<dyn ClusterBackend>,
        storage: Arc<dyn Storage>,
        options: ProxyOptions,
    ) -> Self {
        Self {
            cluster,
            storage,
            options,
        }
    }

    pub fn options(&self) -> &ProxyOptions {
        &self.options
    }

    /// Run the node's work and return the payload for its target.
    pub async fn execute(&self, node: &TaskNode, ctx: &RunContext) -> Result<String> {
        match node.work() {
            Work::Local(action) => self.run_local(action.as_ref(), ctx).await,
            Work::Remote(spec) => self.run_remote(node.id(), spec).await,
        }
    }

    async fn run_local(&self, action: &dyn LocalAction, ctx: &RunContext) -> Result<String> {
        let max_attempts = if action.retry_safe() {
            self.options.retry.max_attempts.max(1)
        } else {
            1
        };

        let mut attempt = 1;
        loop {
            debug!(task = %ctx.task, attempt, "running local action");
            match action.run(ctx).await {
                Ok(payload) => return Ok(payload),
                Err(err) if attempt < max_attempts => {
                    let delay = self.options.retry.backoff_for(attempt);
                    warn!(
                        task = %ctx.task,
                        attempt,
                        error = %err,
                        ?delay,
                        "retry-safe local action failed; retrying"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn run_remote(&self, task: &TaskId, spec: &JobSpec) -> Result<String> {
        let mut handle = self.submit(task, spec).await?;
        let result = self
            .await_terminal(
                &mut handle,
                self.options.poll_interval,
                self.options.job_timeout,
            )
            .await?;

        match result.status {
            JobStatus::Succeeded => {
                info!(
                    task = %task,
                    job_id = %result.job_id,
                    pool_id = %spec.pool.pool_id,
                    elapsed = ?result.elapsed,
                    "remote job succeeded"
                );
                Ok(spec.pool.pool_id.clone())
            }
            _ => Err(BatchdagError::JobFailed {
                job_id: result.job_id.to_string(),
                task: task.to_string(),
            }),
        }
    }

    /// Upload the job's inputs, then submit it, retrying rejected
    /// submissions with backoff.
    pub async fn submit(&self, task: &TaskId, spec: &JobSpec) -> Result<JobHandle> {
        for input in &spec.inputs {
            debug!(task = %task, local = ?input.local, remote = %input.remote, "uploading job input");
            self.storage.put(&input.local, &input.remote).await?;
        }

        let policy = self.options.retry;
        let mut attempt = 1;
        loop {
            match self.cluster.submit(spec).await {
                Ok(job_id) => {
                    info!(
                        task = %task,
                        job_id = %job_id,
                        pool_id = %spec.pool.pool_id,
                        attempt,
                        "submitted remote job"
                    );
                    return Ok(JobHandle::new(job_id, task.clone()));
                }
                Err(err @ BatchdagError::Submission { .. }) if attempt < policy.max_attempts => {
                    let delay = policy.backoff_for(attempt);
                    warn!(task = %task, attempt, error = %err, ?delay, "submission rejected; backing off");
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Poll until the job is terminal or `limit` elapses.
    ///
    /// On timeout the job is left running on the cluster; call
    /// [`cancel`](Self::cancel) explicitly to stop it.
    pub async fn await_terminal(
        &self,
        handle: &mut JobHandle,
        poll_interval: Duration,
        limit: Duration,
    ) -> Result<JobResult> {
        let started = Instant::now();

        let poll_loop = async {
            let mut polls = 0u32;
            loop {
                let status = self.cluster.poll(handle.job_id()).await?;
                polls += 1;
                handle.advance_to(status)?;
                if status.is_terminal() {
                    return Ok::<_, BatchdagError>(polls);
                }
                sleep(poll_interval).await;
            }
        };

        let outcome = timeout(limit, poll_loop).await;
        match outcome {
            Ok(Ok(polls)) => Ok(JobResult {
                job_id: handle.job_id().clone(),
                status: handle.status(),
                elapsed: started.elapsed(),
                polls,
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => {
                warn!(
                    task = %handle.task(),
                    job_id = %handle.job_id(),
                    status = %handle.status(),
                    "timed out waiting for job; leaving it running for inspection"
                );
                Err(BatchdagError::JobTimeout {
                    job_id: handle.job_id().to_string(),
                    waited: limit,
                })
            }
        }
    }

    pub async fn cancel(&self, handle: &JobHandle) -> Result<()> {
        info!(task = %handle.task(), job_id = %handle.job_id(), "cancelling remote job");
        self.cluster.cancel(handle.job_id()).await
    }
}
