//! CLI-specific error types and exit code mapping

use logflow_core::error::{ConfigError, LogflowError};
use logflow_pipeline::LogPipelineError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration loading or validation failure.
    #[error("configuration error: {0}")]
    Config(String),

    /// A subcommand-specific operation failed (bad arguments, unknown section).
    #[error("{0}")]
    Command(String),

    /// Stored segments or stage state could not be read.
    #[error("storage error: {0}")]
    Storage(String),

    /// JSON serialisation failed during output rendering.
    #[error("json output error: {0}")]
    JsonSerialize(#[from] serde_json::Error),

    /// IO error (stdout write, etc.).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapped domain error from logflow-core.
    #[error("{0}")]
    Core(#[from] LogflowError),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                          |
    /// |------|----------------------------------|
    /// | 0    | Success                          |
    /// | 1    | General / command error          |
    /// | 2    | Configuration error              |
    /// | 3    | Storage or state unreadable      |
    /// | 10   | IO error                         |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::Core(LogflowError::Config(_)) => 2,
            Self::Storage(_) | Self::Core(LogflowError::State(_)) => 3,
            Self::Io(_) => 10,
            Self::JsonSerialize(_) | Self::Command(_) | Self::Core(_) => 1,
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

impl From<LogPipelineError> for CliError {
    fn from(e: LogPipelineError) -> Self {
        match e {
            LogPipelineError::Config { .. } => Self::Config(e.to_string()),
            LogPipelineError::Query(_) => Self::Command(e.to_string()),
            other => Self::Storage(other.to_string()),
        }
    }
}
