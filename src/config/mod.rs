// src/config/mod.rs

//! Configuration loading and validation for batchdag.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Parse durations, apply credential fallbacks and check invariants
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_from_str};
pub use model::{
    ClusterSection, ConfigFile, RawClusterSection, RawConfigFile, RawRunSection, RawVideoSection,
    RunSection, StyleSection, VideoSection,
};
pub use validate::current_resource_suffix;
