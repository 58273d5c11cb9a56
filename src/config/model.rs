// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::exec::{ClusterCredentials, PoolSpec, ProxyOptions, RetryPolicy};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// state_root = "data/luigioutputs"
/// poll_interval = "5s"
/// job_timeout = "2h"
///
/// [cluster]
/// pool_id = "AzureBatch-Pool-Id-17"
/// node_count = 2
///
/// [video]
/// file_name = "orangutan.mp4"
///
/// [style]
/// artifacts = "src/final_project/models/artifacts.tar.gz"
/// ```
///
/// All sections are optional and have reasonable defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: RawRunSection,

    #[serde(default)]
    pub cluster: RawClusterSection,

    #[serde(default)]
    pub video: RawVideoSection,

    #[serde(default)]
    pub style: StyleSection,
}

/// `[config]` section: where markers live and how long to wait on jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct RawRunSection {
    #[serde(default = "default_state_root")]
    pub state_root: PathBuf,

    /// Duration string, e.g. `"5s"`.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    #[serde(default = "default_job_timeout")]
    pub job_timeout: String,

    /// Total submission attempts, including the first.
    #[serde(default = "default_submit_attempts")]
    pub submit_attempts: u32,

    #[serde(default = "default_initial_backoff")]
    pub initial_backoff: String,

    #[serde(default = "default_max_backoff")]
    pub max_backoff: String,
}

fn default_state_root() -> PathBuf {
    PathBuf::from("data/luigioutputs")
}

fn default_poll_interval() -> String {
    "5s".to_string()
}

fn default_job_timeout() -> String {
    "2h".to_string()
}

fn default_submit_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> String {
    "2s".to_string()
}

fn default_max_backoff() -> String {
    "30s".to_string()
}

impl Default for RawRunSection {
    fn default() -> Self {
        Self {
            state_root: default_state_root(),
            poll_interval: default_poll_interval(),
            job_timeout: default_job_timeout(),
            submit_attempts: default_submit_attempts(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
        }
    }
}

/// `[cluster]` section.
///
/// Account fields left unset fall back to the `BATCH_ACCOUNT_*` /
/// `STORAGE_ACCOUNT_*` environment variables during validation.
#[derive(Debug, Clone, Deserialize)]
pub struct RawClusterSection {
    #[serde(default = "default_pool_id")]
    pub pool_id: String,

    #[serde(default = "default_node_count")]
    pub node_count: u32,

    #[serde(default = "default_vm_size")]
    pub vm_size: String,

    /// Working root of the shell cluster backend.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Share path as seen by job commands.
    #[serde(default = "default_mount")]
    pub mount: String,

    /// Share path as seen by this process.
    #[serde(default = "default_share_root")]
    pub share_root: PathBuf,

    #[serde(default)]
    pub account_name: Option<String>,
    #[serde(default)]
    pub account_key: Option<String>,
    #[serde(default)]
    pub account_url: Option<String>,
    #[serde(default)]
    pub storage_account_name: Option<String>,
    #[serde(default)]
    pub storage_account_key: Option<String>,
}

fn default_pool_id() -> String {
    "AzureBatch-Pool-Id-17".to_string()
}

fn default_node_count() -> u32 {
    2
}

fn default_vm_size() -> String {
    "STANDARD_A1_v2".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".batchdag/cluster")
}

fn default_mount() -> String {
    "/mnt/MyAzureFileShare".to_string()
}

fn default_share_root() -> PathBuf {
    PathBuf::from("/mnt/MyAzureFileShare")
}

impl Default for RawClusterSection {
    fn default() -> Self {
        Self {
            pool_id: default_pool_id(),
            node_count: default_node_count(),
            vm_size: default_vm_size(),
            work_dir: default_work_dir(),
            mount: default_mount(),
            share_root: default_share_root(),
            account_name: None,
            account_key: None,
            account_url: None,
            storage_account_name: None,
            storage_account_key: None,
        }
    }
}

/// `[video]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct RawVideoSection {
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Directory the downloaded video is written to.
    #[serde(default = "default_local_root")]
    pub local_root: PathBuf,

    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Base name of the output video (without extension).
    #[serde(default = "default_styled_name")]
    pub styled_name: String,

    #[serde(default = "default_framerate")]
    pub framerate: u32,

    /// Suffix for per-run remote directories. Defaults to the current UTC
    /// hour (`%Y%m%d%H`); pin it to resume a run started in another hour.
    #[serde(default)]
    pub resource_suffix: Option<String>,
}

fn default_source_url() -> String {
    "https://happypathspublic.blob.core.windows.net/videos/orangutan.mp4".to_string()
}

fn default_local_root() -> PathBuf {
    PathBuf::from("data/video")
}

fn default_file_name() -> String {
    "orangutan.mp4".to_string()
}

fn default_styled_name() -> String {
    "styled_orangutan".to_string()
}

fn default_framerate() -> u32 {
    30
}

impl Default for RawVideoSection {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            local_root: default_local_root(),
            file_name: default_file_name(),
            styled_name: default_styled_name(),
            framerate: default_framerate(),
            resource_suffix: None,
        }
    }
}

/// `[style]` section. Needs no validation, so it is shared by the raw and
/// validated models.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StyleSection {
    /// Local path of the model archive; uploaded with the style job.
    #[serde(default = "default_artifacts")]
    pub artifacts: String,

    #[serde(default)]
    pub cuda: u32,
}

fn default_artifacts() -> String {
    "src/final_project/models/artifacts.tar.gz".to_string()
}

impl Default for StyleSection {
    fn default() -> Self {
        Self {
            artifacts: default_artifacts(),
            cuda: 0,
        }
    }
}

/// Validated configuration.
///
/// Only obtainable through `TryFrom<RawConfigFile>` (or
/// [`ConfigFile::from_raw_with_env`]), so durations are parsed and every
/// invariant has been checked.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub run: RunSection,
    pub cluster: ClusterSection,
    pub video: VideoSection,
    pub style: StyleSection,
}

#[derive(Debug, Clone)]
pub struct RunSection {
    pub state_root: PathBuf,
    pub poll_interval: Duration,
    pub job_timeout: Duration,
    pub retry: RetryPolicy,
}

impl RunSection {
    pub fn proxy_options(&self) -> ProxyOptions {
        ProxyOptions {
            poll_interval: self.poll_interval,
            job_timeout: self.job_timeout,
            retry: self.retry,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClusterSection {
    pub pool: PoolSpec,
    pub work_dir: PathBuf,
    pub mount: String,
    pub share_root: PathBuf,
    pub credentials: ClusterCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSection {
    pub source_url: String,
    pub local_root: PathBuf,
    pub file_name: String,
    pub styled_name: String,
    pub framerate: u32,
    pub resource_suffix: String,
}

impl VideoSection {
    /// Where the downloaded video lives locally.
    pub fn local_path(&self) -> PathBuf {
        self.local_root.join(&self.file_name)
    }
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        run: RunSection,
        cluster: ClusterSection,
        video: VideoSection,
        style: StyleSection,
    ) -> Self {
        Self {
            run,
            cluster,
            video,
            style,
        }
    }
}
