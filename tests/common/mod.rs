#![allow(dead_code)]

use std::error::Error;
use std::sync::Arc;
use std::time::Duration;

use batchdag::exec::{ClusterBackend, JobProxy, ProxyOptions, RetryPolicy};
use batchdag::storage::{MemoryStorage, Storage};

pub use batchdag_test_utils::{
    BuiltGraph, ConfigFileBuilder, FakeCluster, TestGraph, init_tracing, with_timeout,
};

pub type TestResult = Result<(), Box<dyn Error>>;

/// Short timings so remote-work tests finish quickly.
pub fn fast_options() -> ProxyOptions {
    ProxyOptions {
        poll_interval: Duration::from_millis(5),
        job_timeout: Duration::from_secs(2),
        retry: RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        },
    }
}

pub fn proxy_with(cluster: &FakeCluster, storage: &MemoryStorage) -> JobProxy {
    let cluster: Arc<dyn ClusterBackend> = Arc::new(cluster.clone());
    let storage: Arc<dyn Storage> = Arc::new(storage.clone());
    JobProxy::new(cluster, storage, fast_options())
}

/// Proxy for graphs that only contain local work.
pub fn local_proxy() -> JobProxy {
    proxy_with(&FakeCluster::new(), &MemoryStorage::new())
}
