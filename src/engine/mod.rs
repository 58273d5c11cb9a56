// src/engine/mod.rs

//! Pipeline execution.
//!
//! The per-run semantics live in the pure [`Scheduler`](crate::dag::Scheduler);
//! [`driver`] is the async shell that runs ready nodes through the
//! [`JobProxy`](crate::exec::JobProxy) and collects a [`PipelineReport`].

pub mod driver;
pub mod report;

pub use driver::Driver;
pub use report::{NodeReport, PipelineReport};
