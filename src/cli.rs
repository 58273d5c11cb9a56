// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

use crate::types::Stage;

/// Command-line arguments for `batchdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "batchdag",
    version,
    about = "Drive the video style-transfer pipeline, resuming from completed stages.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Batchdag.toml")]
    pub config: String,

    /// Terminal stage to bring up to date; everything it needs runs first.
    #[arg(long, value_enum, value_name = "STAGE", default_value_t = Stage::Postprocess)]
    pub stage: Stage,

    /// Delete this stage's completion marker before running (repeatable).
    #[arg(long, value_enum, value_name = "STAGE")]
    pub invalidate: Vec<Stage>,

    /// Override `[video].resource_suffix`.
    #[arg(long, value_name = "SUFFIX")]
    pub resource_suffix: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `BATCHDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Print the resolved order and marker state without executing anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
