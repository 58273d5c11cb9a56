use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use batchdag::errors::{BatchdagError, Result};
use batchdag::exec::{BoxFuture, ClusterBackend, JobId, JobSpec, PoolSpec};
use batchdag::types::JobStatus;

#[derive(Debug, Default)]
struct FakeState {
    pools: Vec<PoolSpec>,
    submissions: Vec<JobSpec>,
    submit_attempts: u32,
    cancellations: Vec<JobId>,
    /// Remaining submissions to reject with `Submission`.
    reject_submissions: u32,
    /// Tasks whose jobs end `Failed`.
    failing_tasks: HashSet<String>,
    jobs: HashMap<JobId, (String, usize)>,
    polls: u32,
}

/// A fake cluster that:
/// - records pools, submissions and cancellations
/// - can reject the next N submissions
/// - answers polls from a per-job status script (the last entry repeats).
#[derive(Debug, Clone)]
pub struct FakeCluster {
    script: Arc<Vec<JobStatus>>,
    state: Arc<Mutex<FakeState>>,
}

impl Default for FakeCluster {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCluster {
    /// Every job goes `Running` then `Succeeded`.
    pub fn new() -> Self {
        Self::with_statuses(vec![JobStatus::Running, JobStatus::Succeeded])
    }

    /// Every job walks `statuses`, one entry per poll.
    pub fn with_statuses(statuses: Vec<JobStatus>) -> Self {
        assert!(!statuses.is_empty(), "status script must not be empty");
        Self {
            script: Arc::new(statuses),
            state: Arc::new(Mutex::new(FakeState::default())),
        }
    }

    pub fn reject_submissions(self, count: u32) -> Self {
        self.state.lock().unwrap().reject_submissions = count;
        self
    }

    /// Jobs submitted for `task` (the `JobSpec::task` label) end `Failed`.
    pub fn fail_task(self, task: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .failing_tasks
            .insert(task.to_string());
        self
    }

    pub fn pools(&self) -> Vec<PoolSpec> {
        self.state.lock().unwrap().pools.clone()
    }

    pub fn submissions(&self) -> Vec<JobSpec> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn submitted_tasks(&self) -> Vec<String> {
        self.submissions().into_iter().map(|s| s.task).collect()
    }

    pub fn submit_attempts(&self) -> u32 {
        self.state.lock().unwrap().submit_attempts
    }

    pub fn cancellations(&self) -> Vec<JobId> {
        self.state.lock().unwrap().cancellations.clone()
    }

    pub fn polls(&self) -> u32 {
        self.state.lock().unwrap().polls
    }
}

impl ClusterBackend for FakeCluster {
    fn ensure_pool<'a>(&'a self, pool: &'a PoolSpec) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            if !state.pools.iter().any(|p| p.pool_id == pool.pool_id) {
                state.pools.push(pool.clone());
            }
            Ok(())
        })
    }

    fn submit<'a>(&'a self, spec: &'a JobSpec) -> BoxFuture<'a, Result<JobId>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.submit_attempts += 1;

            if state.reject_submissions > 0 {
                state.reject_submissions -= 1;
                return Err(BatchdagError::Submission {
                    task: spec.task.clone(),
                    message: "quota exceeded".to_string(),
                });
            }

            let job_id = JobId(format!("fake-{}", state.submissions.len()));
            state.submissions.push(spec.clone());
            state.jobs.insert(job_id.clone(), (spec.task.clone(), 0));
            Ok(job_id)
        })
    }

    fn poll<'a>(&'a self, job: &'a JobId) -> BoxFuture<'a, Result<JobStatus>> {
        Box::pin(async move {
            let mut state = self.state.lock().unwrap();
            state.polls += 1;
            let failing = state.failing_tasks.clone();
            let (task, polled) = state
                .jobs
                .get_mut(job)
                .ok_or_else(|| anyhow::anyhow!("unknown job '{job}'"))?;

            let idx = (*polled).min(self.script.len() - 1);
            *polled += 1;

            let status = self.script[idx];
            if status == JobStatus::Succeeded && failing.contains(task.as_str()) {
                return Ok(JobStatus::Failed);
            }
            Ok(status)
        })
    }

    fn cancel<'a>(&'a self, job: &'a JobId) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.state.lock().unwrap().cancellations.push(job.clone());
            Ok(())
        })
    }
}
