// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::JobStatus;

#[derive(Error, Debug)]
pub enum BatchdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Target already exists: {}", .0.display())]
    AlreadyExists(PathBuf),

    #[error("Task not found: {0}")]
    TaskNotFound(String),

    #[error("Cycle detected in task graph: {}", .cycle.join(" -> "))]
    CyclicDependency { cycle: Vec<String> },

    #[error("Job submission for '{task}' rejected: {message}")]
    Submission { task: String, message: String },

    #[error("Job '{job_id}' did not reach a terminal state within {waited:?}")]
    JobTimeout { job_id: String, waited: Duration },

    #[error("Job '{job_id}' for '{task}' finished in state Failed")]
    JobFailed { job_id: String, task: String },

    #[error("Invalid job status transition {from:?} -> {to:?}")]
    InvalidJobTransition { from: JobStatus, to: JobStatus },

    #[error("Task '{task}' failed: {message}")]
    TaskExecution { task: String, message: String },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BatchdagError {
    /// Convenience constructor used by local actions.
    pub fn task_execution(task: impl Into<String>, message: impl ToString) -> Self {
        BatchdagError::TaskExecution {
            task: task.into(),
            message: message.to_string(),
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BatchdagError>;
