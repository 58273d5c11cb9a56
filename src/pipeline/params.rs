// src/pipeline/params.rs

//! Typed parameters of each video pipeline stage.
//!
//! Every field here feeds the task key, so changing any of them (the pool,
//! the resource suffix, the source URL, ...) yields a different task and a
//! fresh marker.

use std::path::PathBuf;

use serde::Serialize;

use crate::config::ConfigFile;
use crate::dag::TaskParams;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DownloadVideoParams {
    pub source_url: String,
    pub local_path: PathBuf,
}

impl TaskParams for DownloadVideoParams {
    const KIND: &'static str = "DownloadVideo";
}

/// A third-party downloader may drop a copy of the video into the working
/// directory; this stage removes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanUpStrayParams {
    pub stray: PathBuf,
    pub local_path: PathBuf,
}

impl TaskParams for CleanUpStrayParams {
    const KIND: &'static str = "CleanUpStray";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparePoolParams {
    pub pool_id: String,
    pub node_count: u32,
    pub vm_size: String,
}

impl TaskParams for PreparePoolParams {
    const KIND: &'static str = "PreparePool";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreProcessVideoParams {
    pub pool_id: String,
    pub mount: String,
    pub resource_suffix: String,
    pub file_name: String,
}

impl TaskParams for PreProcessVideoParams {
    const KIND: &'static str = "PreProcessVideo";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StyleImagesParams {
    pub pool_id: String,
    pub mount: String,
    pub resource_suffix: String,
    pub artifacts: String,
    pub cuda: u32,
}

impl TaskParams for StyleImagesParams {
    const KIND: &'static str = "StyleImages";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostProcessVideoParams {
    pub pool_id: String,
    pub mount: String,
    pub resource_suffix: String,
    pub styled_name: String,
    pub framerate: u32,
}

impl TaskParams for PostProcessVideoParams {
    const KIND: &'static str = "PostProcessVideo";
}

/// Parameters of every stage, derived from one validated config.
#[derive(Debug, Clone)]
pub struct StageParams {
    pub download: DownloadVideoParams,
    pub cleanup: CleanUpStrayParams,
    pub pool: PreparePoolParams,
    pub preprocess: PreProcessVideoParams,
    pub style: StyleImagesParams,
    pub postprocess: PostProcessVideoParams,
}

impl StageParams {
    pub fn from_config(cfg: &ConfigFile) -> Self {
        let pool_id = cfg.cluster.pool.pool_id.clone();
        let mount = cfg.cluster.mount.clone();
        let suffix = cfg.video.resource_suffix.clone();
        let local_path = cfg.video.local_path();

        Self {
            download: DownloadVideoParams {
                source_url: cfg.video.source_url.clone(),
                local_path: local_path.clone(),
            },
            cleanup: CleanUpStrayParams {
                stray: PathBuf::from(&cfg.video.file_name),
                local_path,
            },
            pool: PreparePoolParams {
                pool_id: pool_id.clone(),
                node_count: cfg.cluster.pool.node_count,
                vm_size: cfg.cluster.pool.vm_size.clone(),
            },
            preprocess: PreProcessVideoParams {
                pool_id: pool_id.clone(),
                mount: mount.clone(),
                resource_suffix: suffix.clone(),
                file_name: cfg.video.file_name.clone(),
            },
            style: StyleImagesParams {
                pool_id: pool_id.clone(),
                mount: mount.clone(),
                resource_suffix: suffix.clone(),
                artifacts: cfg.style.artifacts.clone(),
                cuda: cfg.style.cuda,
            },
            postprocess: PostProcessVideoParams {
                pool_id,
                mount,
                resource_suffix: suffix,
                styled_name: cfg.video.styled_name.clone(),
                framerate: cfg.video.framerate,
            },
        }
    }
}
