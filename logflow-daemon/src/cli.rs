//! CLI argument definitions for logflow-daemon.

use std::path::PathBuf;

use clap::Parser;

use crate::orchestrator::StageKind;

/// Runs one logflow pipeline stage.
///
/// Each stage is its own process: start one daemon per stage, all pointing at
/// the same configuration file.
#[derive(Parser, Debug)]
#[command(name = "logflow-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Stage to run.
    #[arg(value_enum)]
    pub stage: StageKind,

    /// Path to the configuration file (TOML, or YAML by extension).
    #[arg(short, long, default_value = "logflow.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate the configuration for this stage and exit.
    #[arg(long)]
    pub validate: bool,
}
