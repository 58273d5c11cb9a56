// src/config/validate.rs

use std::time::Duration;

use chrono::Utc;

use crate::config::model::{
    ClusterSection, ConfigFile, RawClusterSection, RawConfigFile, RawRunSection, RawVideoSection,
    RunSection, VideoSection,
};
use crate::errors::{BatchdagError, Result};
use crate::exec::{ClusterCredentials, PoolSpec, RetryPolicy};
use crate::types::parse_duration;

pub const ENV_ACCOUNT_NAME: &str = "BATCH_ACCOUNT_NAME";
pub const ENV_ACCOUNT_KEY: &str = "BATCH_ACCOUNT_KEY";
pub const ENV_ACCOUNT_URL: &str = "BATCH_ACCOUNT_URL";
pub const ENV_STORAGE_ACCOUNT_NAME: &str = "STORAGE_ACCOUNT_NAME";
pub const ENV_STORAGE_ACCOUNT_KEY: &str = "STORAGE_ACCOUNT_KEY";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BatchdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ConfigFile::from_raw_with_env(raw, |key| std::env::var(key).ok())
    }
}

impl ConfigFile {
    /// Validate `raw`, resolving unset credentials through `env`.
    pub fn from_raw_with_env<F>(raw: RawConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let run = validate_run(&raw.config)?;
        let cluster = validate_cluster(raw.cluster, &env)?;
        let video = validate_video(raw.video)?;
        Ok(ConfigFile::new_unchecked(run, cluster, video, raw.style))
    }
}

fn duration_field(section: &str, key: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| BatchdagError::ConfigError(format!("[{section}].{key}: {e}")))
}

fn validate_run(raw: &RawRunSection) -> Result<RunSection> {
    let poll_interval = duration_field("config", "poll_interval", &raw.poll_interval)?;
    let job_timeout = duration_field("config", "job_timeout", &raw.job_timeout)?;
    let initial_backoff = duration_field("config", "initial_backoff", &raw.initial_backoff)?;
    let max_backoff = duration_field("config", "max_backoff", &raw.max_backoff)?;

    if poll_interval.is_zero() {
        return Err(BatchdagError::ConfigError(
            "[config].poll_interval must be greater than zero".to_string(),
        ));
    }

    if job_timeout < poll_interval {
        return Err(BatchdagError::ConfigError(format!(
            "[config].job_timeout ({}) must not be shorter than poll_interval ({})",
            raw.job_timeout, raw.poll_interval
        )));
    }

    if raw.submit_attempts == 0 {
        return Err(BatchdagError::ConfigError(
            "[config].submit_attempts must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(RunSection {
        state_root: raw.state_root.clone(),
        poll_interval,
        job_timeout,
        retry: RetryPolicy {
            max_attempts: raw.submit_attempts,
            initial_backoff,
            max_backoff,
        },
    })
}

fn validate_cluster<F>(raw: RawClusterSection, env: &F) -> Result<ClusterSection>
where
    F: Fn(&str) -> Option<String>,
{
    if raw.pool_id.trim().is_empty() {
        return Err(BatchdagError::ConfigError(
            "[cluster].pool_id must not be empty".to_string(),
        ));
    }

    if raw.node_count == 0 {
        return Err(BatchdagError::ConfigError(
            "[cluster].node_count must be >= 1 (got 0)".to_string(),
        ));
    }

    let credentials = ClusterCredentials {
        account_name: raw.account_name.or_else(|| env(ENV_ACCOUNT_NAME)),
        account_key: raw.account_key.or_else(|| env(ENV_ACCOUNT_KEY)),
        account_url: raw.account_url.or_else(|| env(ENV_ACCOUNT_URL)),
        storage_account_name: raw
            .storage_account_name
            .or_else(|| env(ENV_STORAGE_ACCOUNT_NAME)),
        storage_account_key: raw
            .storage_account_key
            .or_else(|| env(ENV_STORAGE_ACCOUNT_KEY)),
    };

    Ok(ClusterSection {
        pool: PoolSpec {
            pool_id: raw.pool_id,
            node_count: raw.node_count,
            vm_size: raw.vm_size,
        },
        work_dir: raw.work_dir,
        mount: raw.mount,
        share_root: raw.share_root,
        credentials,
    })
}

fn validate_video(raw: RawVideoSection) -> Result<VideoSection> {
    if raw.file_name.trim().is_empty() {
        return Err(BatchdagError::ConfigError(
            "[video].file_name must not be empty".to_string(),
        ));
    }

    if raw.framerate == 0 {
        return Err(BatchdagError::ConfigError(
            "[video].framerate must be >= 1 (got 0)".to_string(),
        ));
    }

    let resource_suffix = match raw.resource_suffix {
        Some(s) if !s.trim().is_empty() => s,
        _ => current_resource_suffix(),
    };

    Ok(VideoSection {
        source_url: raw.source_url,
        local_root: raw.local_root,
        file_name: raw.file_name,
        styled_name: raw.styled_name,
        framerate: raw.framerate,
        resource_suffix,
    })
}

/// Current UTC hour as `%Y%m%d%H`.
pub fn current_resource_suffix() -> String {
    Utc::now().format("%Y%m%d%H").to_string()
}
