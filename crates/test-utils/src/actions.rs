use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use batchdag::dag::RunContext;
use batchdag::errors::{BatchdagError, Result};
use batchdag::exec::{BoxFuture, LocalAction};

/// Shared record of which actions ran, in order.
pub type ExecutionLog = Arc<Mutex<Vec<String>>>;

pub fn new_log() -> ExecutionLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A local action that:
/// - records its name in the shared log
/// - optionally sleeps (so tests can observe concurrency or cancel it)
/// - returns `"<name> ok"` as its payload.
#[derive(Debug)]
pub struct RecordingAction {
    name: String,
    log: ExecutionLog,
    delay: Option<Duration>,
}

impl RecordingAction {
    pub fn new(name: impl Into<String>, log: ExecutionLog) -> Self {
        Self {
            name: name.into(),
            log,
            delay: None,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl LocalAction for RecordingAction {
    fn run<'a>(&'a self, _ctx: &'a RunContext) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.name.clone());
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(format!("{} ok", self.name))
        })
    }
}

/// A local action that fails its first `failures` runs (all of them by
/// default), recording every attempt.
#[derive(Debug)]
pub struct FailingAction {
    name: String,
    log: ExecutionLog,
    failures: u32,
    attempts: AtomicU32,
    retry_safe: bool,
}

impl FailingAction {
    pub fn always(name: impl Into<String>, log: ExecutionLog) -> Self {
        Self {
            name: name.into(),
            log,
            failures: u32::MAX,
            attempts: AtomicU32::new(0),
            retry_safe: false,
        }
    }

    /// Fails `failures` times, then succeeds. Declared retry-safe.
    pub fn flaky(name: impl Into<String>, log: ExecutionLog, failures: u32) -> Self {
        Self {
            name: name.into(),
            log,
            failures,
            attempts: AtomicU32::new(0),
            retry_safe: true,
        }
    }

    pub fn with_retry_safe(mut self, retry_safe: bool) -> Self {
        self.retry_safe = retry_safe;
        self
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl LocalAction for FailingAction {
    fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.log.lock().unwrap().push(self.name.clone());
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt <= self.failures {
                return Err(BatchdagError::task_execution(
                    ctx.task.to_string(),
                    format!("{} failed on attempt {attempt}", self.name),
                ));
            }
            Ok(format!("{} ok", self.name))
        })
    }

    fn retry_safe(&self) -> bool {
        self.retry_safe
    }
}
