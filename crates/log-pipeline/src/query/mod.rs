//! Read-only query over stored segments.
//!
//! A [`QueryEngine`] keeps no state between requests: every request lists the
//! segments present at that moment, reads them oldest first (decompressing
//! `.gz` segments) and returns the first `limit` entries that pass the
//! [`QueryFilter`], rendered by the requested [`Formatter`].
//!
//! ```no_run
//! # async fn demo() -> Result<(), logflow_pipeline::LogPipelineError> {
//! use logflow_core::config::QueryConfig;
//! use logflow_pipeline::query::{QueryEngine, QueryFilter, QueryRequest, ResponseFormat};
//!
//! let engine = QueryEngine::new(&QueryConfig {
//!     storage_dir: "/var/lib/logflow/segments".into(),
//!     default_limit: 50,
//! });
//! let response = engine
//!     .execute(&QueryRequest {
//!         format: ResponseFormat::Json,
//!         filter: QueryFilter::new().level("ERROR"),
//!         limit: Some(10),
//!     })
//!     .await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod format;
pub mod search;

pub use filter::QueryFilter;
pub use format::{Formatter, JsonFormatter, ResponseFormat, TextFormatter, formatter_for};
pub use search::SearchResult;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use logflow_core::config::QueryConfig;
use logflow_core::metrics as m;

use crate::error::LogPipelineError;

/// One query.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub format: ResponseFormat,
    pub filter: QueryFilter,
    /// Falls back to the engine's default limit
    pub limit: Option<usize>,
}

/// Rendered query result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueryResponse {
    pub body: String,
    pub count: usize,
    pub content_type: &'static str,
    /// Stored lines skipped because they did not decode
    pub skipped: u64,
}

/// Stateless query front end over one storage directory.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    storage_dir: PathBuf,
    default_limit: usize,
}

impl QueryEngine {
    pub fn new(config: &QueryConfig) -> Self {
        Self {
            storage_dir: config.storage_dir.clone(),
            default_limit: config.default_limit,
        }
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn default_limit(&self) -> usize {
        self.default_limit
    }

    /// Finds matching entries without rendering them.
    pub async fn search(
        &self,
        filter: &QueryFilter,
        limit: Option<usize>,
    ) -> Result<SearchResult, LogPipelineError> {
        let limit = limit.unwrap_or(self.default_limit);
        search::search(&self.storage_dir, filter, limit).await
    }

    /// Runs `request` and renders the result.
    pub async fn execute(&self, request: &QueryRequest) -> Result<QueryResponse, LogPipelineError> {
        metrics::counter!(m::QUERY_REQUESTS_TOTAL, m::LABEL_OUTPUT => request.format.as_str())
            .increment(1);

        let result = self.search(&request.filter, request.limit).await?;
        let formatter = formatter_for(request.format);
        let body = formatter.render(&result.entries)?;
        debug!(
            count = result.entries.len(),
            segments = result.segments_read,
            skipped = result.undecodable,
            indexed = result.indexed,
            format = %request.format,
            "query served"
        );

        Ok(QueryResponse {
            body,
            count: result.entries.len(),
            content_type: formatter.content_type(),
            skipped: result.undecodable,
        })
    }
}
