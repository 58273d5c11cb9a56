// src/exec/job.rs

//! Remote job descriptions and the handle tracking one submitted job.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::dag::TaskId;
use crate::errors::{BatchdagError, Result};
use crate::types::JobStatus;

/// Opaque identifier assigned by the cluster on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute pool a job runs on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSpec {
    pub pool_id: String,
    pub node_count: u32,
    pub vm_size: String,
}

/// A local file uploaded to shared storage before the job is submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInput {
    pub local: PathBuf,
    pub remote: String,
}

/// What the cluster should run: ordered shell commands plus sizing.
///
/// The scheduler never interprets command output; only the terminal status
/// matters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    /// Label used in job ids and logs.
    pub task: String,
    pub commands: Vec<String>,
    pub pool: PoolSpec,
    pub inputs: Vec<JobInput>,
    /// Remote paths staged into the job's working directory before the
    /// first command runs.
    pub resource_files: Vec<String>,
}

/// Credentials handed through to the cluster backend untouched.
#[derive(Clone, Default)]
pub struct ClusterCredentials {
    pub account_name: Option<String>,
    pub account_key: Option<String>,
    pub account_url: Option<String>,
    pub storage_account_name: Option<String>,
    pub storage_account_key: Option<String>,
}

impl fmt::Debug for ClusterCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn redact(v: &Option<String>) -> &'static str {
            if v.is_some() { "<set>" } else { "<unset>" }
        }
        f.debug_struct("ClusterCredentials")
            .field("account_name", &self.account_name)
            .field("account_key", &redact(&self.account_key))
            .field("account_url", &self.account_url)
            .field("storage_account_name", &self.storage_account_name)
            .field("storage_account_key", &redact(&self.storage_account_key))
            .finish()
    }
}

/// Tracks one submitted job through `Pending -> Running -> terminal`.
#[derive(Debug, Clone)]
pub struct JobHandle {
    job_id: JobId,
    task: TaskId,
    submitted_at: DateTime<Utc>,
    status: JobStatus,
}

impl JobHandle {
    pub fn new(job_id: JobId, task: TaskId) -> Self {
        Self {
            job_id,
            task,
            submitted_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    pub fn task(&self) -> &TaskId {
        &self.task
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn status(&self) -> JobStatus {
        self.status
    }

    /// Apply a status observed from the cluster.
    ///
    /// A terminal status seen while still `Pending` is recorded as passing
    /// through `Running`. Going backwards, or leaving a terminal state, is
    /// rejected.
    pub fn advance_to(&mut self, next: JobStatus) -> Result<()> {
        if !self.status.can_advance_to(next) {
            return Err(BatchdagError::InvalidJobTransition {
                from: self.status,
                to: next,
            });
        }
        if self.status == next {
            return Ok(());
        }

        if self.status == JobStatus::Pending && next.is_terminal() {
            debug!(job_id = %self.job_id, "job finished before it was observed running");
            self.status = JobStatus::Running;
        }

        debug!(job_id = %self.job_id, from = %self.status, to = %next, "job status changed");
        self.status = next;
        Ok(())
    }
}

/// Terminal outcome returned by [`JobProxy::await_terminal`](crate::exec::JobProxy::await_terminal).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobResult {
    pub job_id: JobId,
    pub status: JobStatus,
    pub elapsed: Duration,
    pub polls: u32,
}
