//! CLI argument parsing using clap derive API
//!
//! Purely declarative: no I/O happens here.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

/// logflow -- query stored logs and inspect pipeline progress.
///
/// Use `logflow <COMMAND> --help` for subcommand details.
#[derive(Parser, Debug)]
#[command(name = "logflow", version, about, long_about = None)]
pub struct Cli {
    /// Path to the logflow.toml (or .yaml) configuration file.
    #[arg(short, long, default_value = "logflow.toml")]
    pub config: PathBuf,

    /// Log level for diagnostics on stderr (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Output format.
    #[arg(long, global = true, default_value = "text")]
    pub output: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

/// Supported output formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable table / text output.
    Text,
    /// Machine-readable JSON.
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search stored log entries.
    Query(QueryArgs),

    /// Show how far each stage has progressed.
    Status(StatusArgs),

    /// Manage configuration.
    Config(ConfigArgs),
}

// ---- query ----

/// Search stored segments, oldest entries first.
#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Only entries at or after this RFC 3339 timestamp.
    #[arg(long)]
    pub since: Option<String>,

    /// Only entries at or before this RFC 3339 timestamp.
    #[arg(long)]
    pub until: Option<String>,

    /// Only entries with this level (case-insensitive).
    #[arg(long)]
    pub level: Option<String>,

    /// Only entries from this day, `YYYY-MM-DD`. Alone or with --level it is
    /// answered from the storage index.
    #[arg(long)]
    pub date: Option<String>,

    /// Field equality, `name=value`. Repeatable.
    #[arg(long = "field", value_name = "NAME=VALUE")]
    pub fields: Vec<String>,

    /// Case-insensitive regex over the stored line.
    #[arg(long)]
    pub pattern: Option<String>,

    /// Maximum number of entries (default: `[query] default_limit`).
    #[arg(short = 'n', long)]
    pub limit: Option<usize>,

    /// Read segments from this directory instead of the configured one.
    #[arg(long)]
    pub storage_dir: Option<PathBuf>,
}

// ---- status ----

/// Report cursor and rotation progress from each stage's state file.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Also list state file paths and stored segments.
    #[arg(short, long)]
    pub verbose: bool,
}

// ---- config ----

/// Manage logflow configuration.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Validate the configuration file, including filter patterns.
    Validate,
    /// Show the effective configuration (file + env overrides + defaults).
    Show {
        /// Show only one section (general, collector, parser, storage, query, metrics).
        #[arg(long)]
        section: Option<String>,
    },
}
