// src/pipeline/stages.rs

//! Work performed by each video pipeline stage.
//!
//! The first three stages are local actions; the last three are batch jobs
//! whose commands read and write per-run directories under the share mount:
//!
//! ```text
//! <mount>/audio<suffix>/audio.aac
//! <mount>/images<suffix>/%05d_video.jpg
//! <mount>/styled_output<suffix>/%05d_video.jpg
//! <mount>/styled_vid<suffix>/<styled_name>_processed.mp4
//! ```
//!
//! Command output is appended to `stdout.txt` in the job directory. No
//! command is piped, so a failing step fails its job.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::dag::RunContext;
use crate::errors::{BatchdagError, Result};
use crate::exec::{BoxFuture, ClusterBackend, JobInput, JobSpec, LocalAction, PoolSpec};
use crate::pipeline::params::{
    PostProcessVideoParams, PreProcessVideoParams, StyleImagesParams,
};
use crate::storage::Storage;

/// Fetch the source video to its declared local path.
#[derive(Debug)]
pub struct DownloadVideo {
    storage: Arc<dyn Storage>,
    source_url: String,
    dest: PathBuf,
}

impl DownloadVideo {
    pub fn new(storage: Arc<dyn Storage>, source_url: impl Into<String>, dest: PathBuf) -> Self {
        Self {
            storage,
            source_url: source_url.into(),
            dest,
        }
    }
}

impl LocalAction for DownloadVideo {
    fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            let bytes = self.storage.fetch(&self.source_url, &self.dest).await?;
            info!(task = %ctx.task, url = %self.source_url, dest = ?self.dest, bytes, "video downloaded");
            Ok(self.dest.display().to_string())
        })
    }

    /// The fetch lands atomically, so a failed attempt leaves nothing behind.
    fn retry_safe(&self) -> bool {
        true
    }
}

/// Remove a stray copy of the video from the working directory, if any.
///
/// The downloaded video itself is never removed, even when `local_root`
/// points at the working directory.
#[derive(Debug)]
pub struct CleanUpStray {
    stray: PathBuf,
    local_path: PathBuf,
}

impl CleanUpStray {
    pub fn new(stray: PathBuf, local_path: PathBuf) -> Self {
        Self { stray, local_path }
    }

    async fn is_download(&self) -> bool {
        match (
            tokio::fs::canonicalize(&self.stray).await,
            tokio::fs::canonicalize(&self.local_path).await,
        ) {
            (Ok(stray), Ok(local)) => stray == local,
            _ => false,
        }
    }
}

impl LocalAction for CleanUpStray {
    fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            if self.is_download().await {
                info!(task = %ctx.task, path = ?self.stray, "stray path is the downloaded video; keeping it");
                return Ok(format!("kept {}", self.local_path.display()));
            }

            match tokio::fs::remove_file(&self.stray).await {
                Ok(()) => {
                    info!(task = %ctx.task, path = ?self.stray, "stray file cleaned up");
                    Ok(format!("removed {}", self.stray.display()))
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {
                    info!(task = %ctx.task, path = ?self.stray, "no stray file to clean up");
                    Ok(format!("absent {}", self.stray.display()))
                }
                Err(e) => Err(BatchdagError::task_execution(
                    ctx.task.to_string(),
                    format!("removing {}: {e}", self.stray.display()),
                )),
            }
        })
    }

    fn retry_safe(&self) -> bool {
        true
    }
}

/// Create the compute pool if it does not exist yet.
#[derive(Debug)]
pub struct PreparePool {
    cluster: Arc<dyn ClusterBackend>,
    pool: PoolSpec,
}

impl PreparePool {
    pub fn new(cluster: Arc<dyn ClusterBackend>, pool: PoolSpec) -> Self {
        Self { cluster, pool }
    }
}

impl LocalAction for PreparePool {
    fn run<'a>(&'a self, ctx: &'a RunContext) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            self.cluster.ensure_pool(&self.pool).await?;
            info!(task = %ctx.task, pool_id = %self.pool.pool_id, "pool prepared");
            Ok(self.pool.pool_id.clone())
        })
    }

    fn retry_safe(&self) -> bool {
        true
    }
}

fn share_dir(mount: &str, name: &str, suffix: &str) -> String {
    format!("{}/{name}{suffix}", mount.trim_end_matches('/'))
}

/// Split the video into an audio track and numbered frames.
///
/// The local video is uploaded under its file name and staged into the job
/// directory, so ffmpeg reads it by relative path.
pub fn preprocess_job(params: &PreProcessVideoParams, pool: &PoolSpec, local_video: &Path) -> JobSpec {
    let audio = share_dir(&params.mount, "audio", &params.resource_suffix);
    let images = share_dir(&params.mount, "images", &params.resource_suffix);
    let input = &params.file_name;

    JobSpec {
        task: "PreProcessVideo".to_string(),
        commands: vec![
            format!("mkdir -p {audio}"),
            format!("mkdir -p {images}"),
            format!("ffmpeg -i {input} -y {audio}/audio.aac >> stdout.txt 2>&1"),
            format!("ffmpeg -i {input} {images}/%05d_video.jpg -hide_banner >> stdout.txt 2>&1"),
        ],
        pool: pool.clone(),
        inputs: vec![JobInput {
            local: local_video.to_path_buf(),
            remote: params.file_name.clone(),
        }],
        resource_files: vec![params.file_name.clone()],
    }
}

/// Unpack the model archive and stylize every extracted frame.
///
/// `artifacts` is a local path; the archive is uploaded under its file name
/// and staged into the job directory.
pub fn style_job(params: &StyleImagesParams, pool: &PoolSpec) -> JobSpec {
    let images = share_dir(&params.mount, "images", &params.resource_suffix);
    let styled = share_dir(&params.mount, "styled_output", &params.resource_suffix);
    let archive = Path::new(&params.artifacts)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| params.artifacts.clone());

    JobSpec {
        task: "StyleImages".to_string(),
        commands: vec![
            format!("tar -xvzf {archive}"),
            format!(
                "python3 artifacts/style_transfer.py --model-dir artifacts --cuda {} --content-dir {images} --output-dir {styled}",
                params.cuda
            ),
        ],
        pool: pool.clone(),
        inputs: vec![JobInput {
            local: PathBuf::from(&params.artifacts),
            remote: archive.clone(),
        }],
        resource_files: vec![archive],
    }
}

/// Re-encode the styled frames and merge the original audio back in.
pub fn postprocess_job(params: &PostProcessVideoParams, pool: &PoolSpec) -> JobSpec {
    let out = share_dir(&params.mount, "styled_vid", &params.resource_suffix);
    let audio = share_dir(&params.mount, "audio", &params.resource_suffix);
    let styled = share_dir(&params.mount, "styled_output", &params.resource_suffix);

    JobSpec {
        task: "PostProcessVideo".to_string(),
        commands: vec![
            format!("mkdir -p {out}"),
            format!(
                "ffmpeg -framerate {} -i {styled}/%05d_video.jpg -c:v libx264 -profile:v high -crf 20 -pix_fmt yuv420p -y {out}/video_without_audio.mp4 >> stdout.txt 2>&1",
                params.framerate
            ),
            format!(
                "ffmpeg -i {out}/video_without_audio.mp4 -i {audio}/audio.aac -map 0:0 -map 1:0 -vcodec copy -acodec copy -y {out}/{}_processed.mp4 >> stdout.txt 2>&1",
                params.styled_name
            ),
        ],
        pool: pool.clone(),
        inputs: Vec::new(),
        resource_files: Vec::new(),
    }
}
