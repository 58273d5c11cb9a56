#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use batchdag::config::{ConfigFile, RawConfigFile};
use batchdag::dag::{GraphBuilder, NodeId, PipelineGraph, TaskId, Work};
use batchdag::exec::LocalAction;

use crate::actions::{ExecutionLog, FailingAction, RecordingAction, new_log};

/// Builder for `ConfigFile` rooted in a test directory.
///
/// Markers, the shell cluster's work dir, the share and the model archive
/// path all live under `root`; timings are short and the resource suffix is pinned.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new(root: &Path) -> Self {
        let mut config = RawConfigFile::default();
        config.config.state_root = root.join("state");
        config.config.poll_interval = "10ms".to_string();
        config.config.job_timeout = "5s".to_string();
        config.config.initial_backoff = "10ms".to_string();
        config.config.max_backoff = "50ms".to_string();
        config.cluster.work_dir = root.join("cluster");
        config.cluster.share_root = root.join("share");
        config.cluster.mount = root.join("share").display().to_string();
        config.video.local_root = root.join("video");
        config.video.source_url = "videos/orangutan.mp4".to_string();
        config.video.resource_suffix = Some("2024010112".to_string());
        config.style.artifacts = root.join("models/artifacts.tar.gz").display().to_string();
        Self { config }
    }

    pub fn with_pool_id(mut self, pool_id: &str) -> Self {
        self.config.cluster.pool_id = pool_id.to_string();
        self
    }

    pub fn with_resource_suffix(mut self, suffix: &str) -> Self {
        self.config.video.resource_suffix = Some(suffix.to_string());
        self
    }

    pub fn with_source_url(mut self, url: &str) -> Self {
        self.config.video.source_url = url.to_string();
        self
    }

    pub fn raw(&self) -> &RawConfigFile {
        &self.config
    }

    /// Validate without consulting the process environment.
    pub fn build(self) -> ConfigFile {
        ConfigFile::from_raw_with_env(self.config, |_| None)
            .expect("Failed to build valid config from builder")
    }
}

/// Builder for small graphs of named local actions.
///
/// Each name becomes `TaskId::named(name)`; by default the action is a
/// [`RecordingAction`] writing to a shared [`ExecutionLog`].
pub struct TestGraph {
    builder: GraphBuilder,
    nodes: HashMap<String, NodeId>,
    log: ExecutionLog,
}

impl TestGraph {
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            builder: GraphBuilder::new(state_root),
            nodes: HashMap::new(),
            log: new_log(),
        }
    }

    /// `names[i + 1]` depends on `names[i]`.
    pub fn chain(state_root: impl Into<PathBuf>, names: &[&str]) -> Self {
        let mut graph = Self::new(state_root);
        for name in names {
            graph = graph.task(name);
        }
        for pair in names.windows(2) {
            graph = graph.edge(pair[1], pair[0]);
        }
        graph
    }

    pub fn task(self, name: &str) -> Self {
        let action = RecordingAction::new(name, Arc::clone(&self.log));
        self.with_action(name, action)
    }

    pub fn slow_task(self, name: &str, delay: Duration) -> Self {
        let action = RecordingAction::new(name, Arc::clone(&self.log)).with_delay(delay);
        self.with_action(name, action)
    }

    pub fn failing_task(self, name: &str) -> Self {
        let action = FailingAction::always(name, Arc::clone(&self.log));
        self.with_action(name, action)
    }

    pub fn with_action(self, name: &str, action: impl LocalAction + 'static) -> Self {
        self.with_work(name, Work::Local(Arc::new(action)))
    }

    pub fn with_work(mut self, name: &str, work: Work) -> Self {
        let node = self.builder.add_task(TaskId::named(name), work);
        self.nodes.insert(name.to_string(), node);
        self
    }

    /// `node` depends on `dep`.
    pub fn edge(mut self, node: &str, dep: &str) -> Self {
        let (n, d) = (self.node(node), self.node(dep));
        self.builder.depends_on(n, d);
        self
    }

    pub fn node(&self, name: &str) -> NodeId {
        *self
            .nodes
            .get(name)
            .unwrap_or_else(|| panic!("unknown test task '{name}'"))
    }

    pub fn log(&self) -> ExecutionLog {
        Arc::clone(&self.log)
    }

    pub fn build(self) -> BuiltGraph {
        BuiltGraph {
            graph: Arc::new(self.builder.build()),
            nodes: self.nodes,
            log: self.log,
        }
    }
}

/// Result of [`TestGraph::build`].
pub struct BuiltGraph {
    pub graph: Arc<PipelineGraph>,
    pub nodes: HashMap<String, NodeId>,
    pub log: ExecutionLog,
}

impl BuiltGraph {
    pub fn node(&self, name: &str) -> NodeId {
        self.nodes[name]
    }

    pub fn executed(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}
