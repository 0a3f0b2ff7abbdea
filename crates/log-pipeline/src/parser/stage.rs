//! Parser stage: turns batch files into NDJSON entry files.
//!
//! Batches are processed in ascending sequence order. For each batch, every
//! line is decoded with the configured [`ParserRouter`], entries rejected by
//! the entry filter are dropped and the survivors are published as
//! `parsed_<seq>.ndjson` under the batch's own sequence. The cursor moves
//! past a batch only after its output is published, so replaying a batch
//! after a crash rewrites the same file with the same contents.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use logflow_core::config::ParserConfig;
use logflow_core::metrics as m;
use logflow_core::state::StateFile;

use super::ParserRouter;
use crate::error::LogPipelineError;
use crate::filter::FilterEngine;
use crate::queue::{self, BATCH_FILES, PARSED_FILES, QueueFile};
use crate::runner::{CycleReport, Stage};

/// Last batch file the parser fully handled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserCursor {
    pub last_processed: Option<String>,
}

impl ParserCursor {
    /// Sequence of the last handled batch.
    pub fn last_sequence(&self) -> Option<u64> {
        self.last_processed
            .as_deref()
            .and_then(|name| BATCH_FILES.sequence_of(name))
    }
}

/// Counters since the stage was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParserStats {
    pub files_processed: u64,
    pub entries_written: u64,
    pub decode_failures: u64,
    pub entries_filtered: u64,
}

/// The parser stage.
pub struct ParserStage {
    config: ParserConfig,
    router: ParserRouter,
    filter: FilterEngine,
    state: StateFile<ParserCursor>,
    cursor: ParserCursor,
    stats: ParserStats,
}

impl ParserStage {
    pub async fn open(config: &ParserConfig) -> Result<Self, LogPipelineError> {
        let filter = FilterEngine::for_entries(&config.filters)?;
        let state = StateFile::<ParserCursor>::new(&config.state_file);
        let cursor = state.load().await?.unwrap_or_default();
        if cursor.last_processed.is_some() && cursor.last_sequence().is_none() {
            return Err(LogPipelineError::Config {
                field: "parser.state_file".to_owned(),
                reason: format!(
                    "cursor names a file outside the batch queue: {:?}",
                    cursor.last_processed
                ),
            });
        }
        queue::ensure_dir(&config.output_dir).await?;

        let router = ParserRouter::for_format(config.format);
        info!(
            format = router.format_name(),
            filters = filter.len(),
            last_processed = cursor.last_processed.as_deref().unwrap_or("-"),
            "parser opened"
        );

        Ok(Self {
            config: config.clone(),
            router,
            filter,
            state,
            cursor,
            stats: ParserStats::default(),
        })
    }

    pub fn cursor(&self) -> &ParserCursor {
        &self.cursor
    }

    pub fn stats(&self) -> ParserStats {
        self.stats
    }

    /// Processes every batch past the cursor.
    pub async fn process_pending(&mut self) -> Result<CycleReport, LogPipelineError> {
        let pending = queue::list_after(
            &self.config.input_dir,
            BATCH_FILES,
            self.cursor.last_sequence(),
        )
        .await?;

        let mut report = CycleReport::default();
        for batch in pending {
            report.merge(self.process_batch(&batch).await?);
        }
        Ok(report)
    }

    async fn process_batch(&mut self, batch: &QueueFile) -> Result<CycleReport, LogPipelineError> {
        let text = tokio::fs::read(&batch.path)
            .await
            .map_err(|e| LogPipelineError::read(&batch.path, e))?;
        let text = String::from_utf8_lossy(&text);

        let mut report = CycleReport {
            consumed: 1,
            ..CycleReport::default()
        };
        let mut failures = 0u64;
        let mut filtered = 0u64;
        let mut body = Vec::new();

        for line in text.lines().filter(|l| !l.trim().is_empty()) {
            let entry = match self.router.parse(line) {
                Ok(entry) => entry,
                Err(e) => {
                    failures += 1;
                    debug!(batch = %batch.name, error = %e, "line did not decode");
                    continue;
                }
            };
            if !self.filter.keep_entry(&entry) {
                filtered += 1;
                continue;
            }
            serde_json::to_writer(&mut body, &entry).map_err(std::io::Error::from)?;
            body.push(b'\n');
            report.produced += 1;
        }
        report.dropped = failures + filtered;

        if report.produced > 0 {
            let name = PARSED_FILES.file_name(batch.seq);
            queue::publish(&self.config.output_dir, &name, &body).await?;
        } else {
            debug!(batch = %batch.name, "no entries survived, nothing published");
        }

        if failures > 0 {
            warn!(batch = %batch.name, failures, "undecodable lines dropped");
        }

        self.cursor.last_processed = Some(batch.name.clone());
        self.state.save(&self.cursor).await?;

        self.stats.files_processed += 1;
        self.stats.entries_written += report.produced;
        self.stats.decode_failures += failures;
        self.stats.entries_filtered += filtered;

        let format = self.router.format_name();
        metrics::counter!(m::PARSER_FILES_PROCESSED_TOTAL).increment(1);
        metrics::counter!(m::PARSER_ENTRIES_WRITTEN_TOTAL).increment(report.produced);
        metrics::counter!(m::PARSER_DECODE_FAILURES_TOTAL, m::LABEL_FORMAT => format)
            .increment(failures);
        metrics::counter!(m::PARSER_ENTRIES_FILTERED_TOTAL).increment(filtered);
        Ok(report)
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }
}

impl Stage for ParserStage {
    fn name(&self) -> &'static str {
        "parser"
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    async fn poll_once(&mut self) -> Result<CycleReport, LogPipelineError> {
        self.process_pending().await
    }
}
