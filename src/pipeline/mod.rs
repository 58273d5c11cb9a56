// src/pipeline/mod.rs

//! The video style-transfer pipeline.
//!
//! ```text
//! PostProcessVideo -> StyleImages -> PreProcessVideo -+-> CleanUpStray -> DownloadVideo
//!                                                     +-> PreparePool
//! ```
//!
//! Arrows point from a stage to what it depends on.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::ConfigFile;
use crate::dag::{GraphBuilder, NodeId, PipelineGraph, TaskId, Work};
use crate::errors::{BatchdagError, Result};
use crate::exec::ClusterBackend;
use crate::storage::Storage;
use crate::types::Stage;

pub mod params;
pub mod stages;

pub use params::StageParams;

/// The built graph plus the node backing each [`Stage`].
#[derive(Debug)]
pub struct VideoPipeline {
    pub graph: PipelineGraph,
    stages: HashMap<Stage, NodeId>,
}

impl VideoPipeline {
    pub fn node_for(&self, stage: Stage) -> Result<NodeId> {
        self.stages
            .get(&stage)
            .copied()
            .ok_or_else(|| BatchdagError::TaskNotFound(format!("{stage:?}")))
    }

    pub fn into_parts(self) -> (PipelineGraph, HashMap<Stage, NodeId>) {
        (self.graph, self.stages)
    }
}

/// Build the full pipeline graph for one invocation.
pub fn build_video_pipeline(
    cfg: &ConfigFile,
    storage: Arc<dyn Storage>,
    cluster: Arc<dyn ClusterBackend>,
) -> Result<VideoPipeline> {
    let params = StageParams::from_config(cfg);
    let pool = &cfg.cluster.pool;

    let mut builder = GraphBuilder::new(&cfg.run.state_root);

    let download = builder.add_task(
        TaskId::of(&params.download)?,
        Work::Local(Arc::new(stages::DownloadVideo::new(
            storage,
            params.download.source_url.clone(),
            params.download.local_path.clone(),
        ))),
    );

    let cleanup = builder.add_task(
        TaskId::of(&params.cleanup)?,
        Work::Local(Arc::new(stages::CleanUpStray::new(
            params.cleanup.stray.clone(),
            params.cleanup.local_path.clone(),
        ))),
    );
    builder.depends_on(cleanup, download);

    let prepare_pool = builder.add_task(
        TaskId::of(&params.pool)?,
        Work::Local(Arc::new(stages::PreparePool::new(cluster, pool.clone()))),
    );

    let preprocess = builder.add_task(
        TaskId::of(&params.preprocess)?,
        Work::Remote(stages::preprocess_job(
            &params.preprocess,
            pool,
            &params.download.local_path,
        )),
    );
    builder
        .depends_on(preprocess, cleanup)
        .depends_on(preprocess, prepare_pool);

    let style = builder.add_task(
        TaskId::of(&params.style)?,
        Work::Remote(stages::style_job(&params.style, pool)),
    );
    builder.depends_on(style, preprocess);

    let postprocess = builder.add_task(
        TaskId::of(&params.postprocess)?,
        Work::Remote(stages::postprocess_job(&params.postprocess, pool)),
    );
    builder.depends_on(postprocess, style);

    let stages = HashMap::from([
        (Stage::Download, download),
        (Stage::Cleanup, cleanup),
        (Stage::Pool, prepare_pool),
        (Stage::Preprocess, preprocess),
        (Stage::Style, style),
        (Stage::Postprocess, postprocess),
    ]);

    Ok(VideoPipeline {
        graph: builder.build(),
        stages,
    })
}
