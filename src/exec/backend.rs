// src/exec/backend.rs

//! Pluggable cluster and local-action abstractions.
//!
//! The proxy talks to a `ClusterBackend` instead of a provider SDK. This
//! makes it easy to swap in a fake cluster in tests while keeping the
//! shell-based implementation in [`shell`](super::shell) for real runs.

use std::fmt::Debug;

use crate::dag::RunContext;
use crate::errors::Result;
use crate::exec::BoxFuture;
use crate::exec::job::{JobId, JobSpec, PoolSpec};
use crate::types::JobStatus;

/// Remote compute cluster as seen by the scheduler.
///
/// Implementations own provider details such as authentication; the core
/// only submits, polls and (explicitly) cancels.
pub trait ClusterBackend: Send + Sync + Debug {
    /// Make sure the pool exists, creating it if needed.
    fn ensure_pool<'a>(&'a self, pool: &'a PoolSpec) -> BoxFuture<'a, Result<()>>;

    /// Submit a job. Authentication or quota problems must be reported as
    /// [`BatchdagError::Submission`](crate::errors::BatchdagError::Submission)
    /// so the proxy can retry them.
    fn submit<'a>(&'a self, spec: &'a JobSpec) -> BoxFuture<'a, Result<JobId>>;

    fn poll<'a>(&'a self, job: &'a JobId) -> BoxFuture<'a, Result<JobStatus>>;

    fn cancel<'a>(&'a self, job: &'a JobId) -> BoxFuture<'a, Result<()>>;
}

/// Side-effecting work executed in-process.
pub trait LocalAction: Send + Sync + Debug {
    /// Run the action. The returned string becomes the marker payload.
    fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<String>>;

    /// Whether a failed run may be retried under the proxy's retry policy.
    fn retry_safe(&self) -> bool {
        false
    }
}
