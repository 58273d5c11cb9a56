// src/dag/mod.rs

//! Task graph representation, ordering and per-run scheduling.
//!
//! - [`target`] holds durable completion markers.
//! - [`node`] defines task identity and the work a node performs.
//! - [`graph`] builds and holds the immutable task graph.
//! - [`resolver`] turns the graph into a topological execution order.
//! - [`scheduler`] is the per-run state machine deciding which nodes are
//!   ready and failing dependents of failed nodes.
//! - [`state`] and [`scheduler_step`] are the types it reports with.

pub mod graph;
pub mod node;
pub mod resolver;
pub mod scheduler;
pub mod scheduler_step;
pub mod state;
pub mod target;

pub use graph::{GraphBuilder, PipelineGraph};
pub use node::{DependencyResult, NodeId, RunContext, TaskId, TaskNode, TaskParams, Work};
pub use resolver::{resolve, resolve_all};
pub use scheduler::Scheduler;
pub use scheduler_step::SchedulerStep;
pub use state::{FailureCause, NodeState, RunOutcome};
pub use target::{Target, TargetWriter};
