//! Error types shared by every logflow stage.

use std::path::PathBuf;

/// Top-level logflow error.
#[derive(Debug, thiserror::Error)]
pub enum LogflowError {
    /// Configuration problem
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Persisted stage state could not be read or written
    #[error("state error: {0}")]
    State(#[from] StateError),

    /// A line could not be decoded into an entry
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// I/O error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file does not exist
    #[error("config file not found: {path}")]
    FileNotFound { path: String },

    /// Config file is not valid TOML/YAML or is missing a required field
    #[error("failed to parse config: {reason}")]
    ParseFailed { reason: String },

    /// A value is out of range or otherwise unusable
    #[error("invalid config value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },

    /// A stage was started without its config section
    #[error("missing config section [{section}]")]
    MissingSection { section: String },
}

/// State file errors. All of these are fatal for the owning stage.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// The state file exists but cannot be read
    #[error("failed to read state file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The state file exists but its contents do not decode
    #[error("corrupt state file {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },

    /// Writing or renaming the state file failed
    #[error("failed to persist state file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The state value could not be serialized
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Line decode failures. Counted and dropped by the parser stage.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Line is empty or whitespace only
    #[error("empty line")]
    Empty,

    /// Not valid JSON
    #[error("invalid json: {reason}")]
    InvalidJson { reason: String },

    /// Valid JSON but not an object
    #[error("json value is not an object")]
    NotObject,

    /// A required field is absent
    #[error("missing required field '{field}'")]
    MissingField { field: String },

    /// The line does not match the format's grammar
    #[error("line does not match {format} format")]
    NoMatch { format: String },
}
