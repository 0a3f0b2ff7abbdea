#![doc = include_str!("../README.md")]

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod state;
pub mod types;

// errors
pub use error::{ConfigError, DecodeError, LogflowError, StateError};

// config
pub use config::{
    CollectorConfig, EntryFilterConfig, FilterAction, GeneralConfig, LogflowConfig,
    MetricsConfig, ParserConfig, QueryConfig, RawFilterConfig, StorageConfig,
};

// traits
pub use pipeline::LogParser;

// state persistence
pub use state::{StateFile, write_atomic};

// domain types
pub use types::{LogFormat, ParsedEntry, ParserFormat, UNKNOWN_LEVEL};
