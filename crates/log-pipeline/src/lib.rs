#![doc = include_str!("../README.md")]
//!
//! # Modules
//!
//! - [`collector`]: tails the source file and publishes raw line batches
//! - [`parser`]: line decoders, format router and the parser stage
//! - [`storage`]: segment appends, rotation, compression and recovery
//! - [`query`]: stateless search and rendering over stored segments
//! - [`filter`]: first-match include/exclude rules shared by two stages
//! - [`queue`]: directory hand-off between stages
//! - [`runner`]: poll loop driving a stage until cancelled
//! - [`error`]: stage error type
//!
//! # Data flow
//!
//! ```text
//! source.log -> Collector -> batch_*.log -> ParserStage -> parsed_*.ndjson
//!                                                              |
//!                       QueryEngine <- segment_*.ndjson[.gz] <- StorageStage
//! ```

pub mod collector;
pub mod error;
pub mod filter;
pub mod parser;
pub mod query;
pub mod queue;
pub mod runner;
pub mod storage;

// --- re-exports ---

// stages
pub use collector::{Collector, SourceCursor};
pub use parser::{ParserCursor, ParserRouter, ParserStage};
pub use query::{QueryEngine, QueryFilter, QueryRequest, QueryResponse, ResponseFormat};
pub use storage::{RotationState, StorageStage};

// loop
pub use runner::{CycleReport, Stage, StageRunner};

// errors
pub use error::LogPipelineError;

// filters
pub use filter::{FilterEngine, FilterRule};
