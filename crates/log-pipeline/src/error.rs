//! Pipeline error type.
//!
//! [`LogPipelineError`] covers every failure a stage can hit. The runner asks
//! [`LogPipelineError::is_fatal`] whether to retry on the next cycle or stop
//! the process; `From<LogPipelineError> for LogflowError` lets callers outside
//! the crate propagate with `?`.

use std::path::PathBuf;

use logflow_core::error::{ConfigError, LogflowError, StateError};

/// Stage-level error.
#[derive(Debug, thiserror::Error)]
pub enum LogPipelineError {
    /// Invalid stage configuration (bad regex, missing section)
    #[error("config error: {field}: {reason}")]
    Config {
        /// config field
        field: String,
        /// why it was rejected
        reason: String,
    },

    /// Source or queue file could not be read; retried next cycle
    #[error("read error: {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// An output file could not be published; retried next cycle
    #[error("write error: {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Stage state could not be loaded or persisted
    #[error(transparent)]
    State(#[from] StateError),

    /// Storage segment bookkeeping is inconsistent or failed mid-rotation
    #[error("storage error: {0}")]
    Storage(String),

    /// Query request could not be served
    #[error("query error: {0}")]
    Query(String),

    /// I/O error without a better classification
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LogPipelineError {
    /// Whether the owning stage must stop.
    ///
    /// Read and write failures are retried on the next poll; state,
    /// configuration and storage bookkeeping failures are not.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Read { .. } | Self::Write { .. } | Self::Io(_) | Self::Query(_) => false,
            Self::Config { .. } | Self::State(_) | Self::Storage(_) => true,
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

impl From<ConfigError> for LogPipelineError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidValue { field, reason } => Self::Config { field, reason },
            ConfigError::MissingSection { section } => Self::Config {
                field: section,
                reason: "section is required to run this stage".to_owned(),
            },
            other => Self::Config {
                field: "config".to_owned(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<LogPipelineError> for LogflowError {
    fn from(err: LogPipelineError) -> Self {
        match err {
            LogPipelineError::State(e) => LogflowError::State(e),
            LogPipelineError::Config { field, reason } => {
                LogflowError::Config(ConfigError::InvalidValue { field, reason })
            }
            LogPipelineError::Io(e) => LogflowError::Io(e),
            LogPipelineError::Read { source, .. } | LogPipelineError::Write { source, .. } => {
                LogflowError::Io(source)
            }
            other => LogflowError::Io(std::io::Error::other(other.to_string())),
        }
    }
}
