// src/exec/mod.rs

//! Work execution layer.
//!
//! Everything that actually performs a node's work lives here, behind the
//! [`JobProxy`]:
//!
//! - [`backend`] defines the `ClusterBackend` and `LocalAction` traits the
//!   proxy dispatches to; tests replace them with fakes.
//! - [`job`] holds job specifications and the `JobHandle` lifecycle.
//! - [`proxy`] submits jobs, polls them to a terminal state and runs local
//!   actions, with bounded retries from [`retry`].
//! - [`shell`] is a `ClusterBackend` that runs job commands as local
//!   processes.

use std::future::Future;
use std::pin::Pin;

pub mod backend;
pub mod job;
pub mod proxy;
pub mod retry;
pub mod shell;

/// Boxed, sendable future used by the object-safe backend traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub use backend::{ClusterBackend, LocalAction};
pub use job::{ClusterCredentials, JobHandle, JobId, JobInput, JobResult, JobSpec, PoolSpec};
pub use proxy::{JobProxy, ProxyOptions};
pub use retry::RetryPolicy;
pub use shell::ShellCluster;
