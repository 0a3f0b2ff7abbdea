//! Collector stage: tails one source file and publishes batch files.
//!
//! Each cycle reads the bytes appended since the persisted [`SourceCursor`],
//! drops lines rejected by the raw-line filter and publishes the rest as
//! `batch_<seq>.log` files of at most `batch_size` lines. The cursor is
//! persisted after every batch, so a crash re-reads at most the batch that
//! was being written.
//!
//! # Truncation and rotation
//! A source smaller than the cursor offset, or one whose inode changed, is
//! treated as a new file and read from offset 0.

pub mod cursor;
pub mod file;

pub use cursor::SourceCursor;

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use logflow_core::config::CollectorConfig;
use logflow_core::metrics as m;
use logflow_core::state::StateFile;

use crate::error::LogPipelineError;
use crate::filter::FilterEngine;
use crate::queue::{self, BATCH_FILES};
use crate::runner::{CycleReport, Stage};

use file::{LineChunk, MAX_CHUNK_BYTES, SourceLine};

/// Counters since the collector was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CollectorStats {
    pub lines_read: u64,
    pub lines_filtered: u64,
    pub batches_written: u64,
    pub source_resets: u64,
    /// Lines longer than one read window, emitted as several records
    pub lines_split: u64,
}

/// The collector stage.
pub struct Collector {
    config: CollectorConfig,
    filter: FilterEngine,
    state: StateFile<SourceCursor>,
    cursor: SourceCursor,
    next_seq: u64,
    stats: CollectorStats,
}

impl Collector {
    /// Loads the cursor, prepares the output directory and compiles filters.
    ///
    /// A corrupt state file or an invalid filter pattern is an error.
    pub async fn open(config: &CollectorConfig) -> Result<Self, LogPipelineError> {
        if config.batch_size == 0 {
            return Err(LogPipelineError::Config {
                field: "collector.batch_size".to_owned(),
                reason: "must be greater than 0".to_owned(),
            });
        }
        let filter = FilterEngine::for_raw_lines(&config.filters)?;
        let state = StateFile::<SourceCursor>::new(&config.state_file);

        let cursor = match state.load().await? {
            Some(cursor) if cursor.tracks(&config.source_file) => cursor,
            Some(cursor) => {
                warn!(
                    recorded = %cursor.path.display(),
                    configured = %config.source_file.display(),
                    "source file changed since last run, starting from offset 0"
                );
                SourceCursor {
                    last_sequence: cursor.last_sequence,
                    ..SourceCursor::new(&config.source_file)
                }
            }
            None => SourceCursor::new(&config.source_file),
        };

        queue::ensure_dir(&config.output_dir).await?;
        let highest = queue::highest_sequence(&config.output_dir, BATCH_FILES)
            .await?
            .unwrap_or(0);
        let next_seq = cursor.last_sequence.max(highest) + 1;

        info!(
            source = %config.source_file.display(),
            offset = cursor.byte_offset,
            next_seq,
            filters = filter.len(),
            "collector opened"
        );

        Ok(Self {
            config: config.clone(),
            filter,
            state,
            cursor,
            next_seq,
            stats: CollectorStats::default(),
        })
    }

    pub fn cursor(&self) -> &SourceCursor {
        &self.cursor
    }

    pub fn stats(&self) -> CollectorStats {
        self.stats
    }

    /// Reads everything appended since the last cycle.
    pub async fn collect(&mut self) -> Result<CycleReport, LogPipelineError> {
        let source = self.config.source_file.clone();
        let Some(stat) = file::stat(&source)
            .await
            .map_err(|e| LogPipelineError::read(&source, e))?
        else {
            debug!(source = %source.display(), "source file not present");
            return Ok(CycleReport::default());
        };

        if self.cursor.is_stale(stat.size, stat.inode) {
            warn!(
                source = %source.display(),
                offset = self.cursor.byte_offset,
                size = stat.size,
                "source truncated or replaced, resetting offset to 0"
            );
            self.cursor.reset(stat.inode);
            self.stats.source_resets += 1;
            metrics::counter!(m::COLLECTOR_SOURCE_RESETS_TOTAL).increment(1);
            self.persist().await?;
        } else if self.cursor.inode.is_none() {
            self.cursor.inode = stat.inode;
        }

        let mut report = CycleReport::default();
        while self.cursor.byte_offset < stat.size {
            let chunk = file::read_lines(&source, self.cursor.byte_offset, stat.size, MAX_CHUNK_BYTES)
                .await
                .map_err(|e| LogPipelineError::read(&source, e))?;
            if chunk.consumed == 0 {
                // only a partial line is available
                break;
            }
            report.merge(self.emit(chunk, stat.modified).await?);
        }
        Ok(report)
    }

    async fn emit(
        &mut self,
        chunk: LineChunk,
        modified: Option<DateTime<Utc>>,
    ) -> Result<CycleReport, LogPipelineError> {
        if chunk.split {
            warn!(
                source = %self.config.source_file.display(),
                offset = chunk.end_offset,
                max_bytes = MAX_CHUNK_BYTES,
                "line exceeds read window, splitting it into separate records"
            );
            self.stats.lines_split += 1;
            metrics::counter!(m::COLLECTOR_LINES_SPLIT_TOTAL).increment(1);
        }

        let mut report = CycleReport::default();
        let mut pending: Vec<&SourceLine> = Vec::with_capacity(self.config.batch_size);

        for line in &chunk.lines {
            report.consumed += 1;
            if !self.filter.keep_line(&line.text) {
                report.dropped += 1;
                continue;
            }
            pending.push(line);
            if pending.len() == self.config.batch_size {
                self.write_batch(&pending, modified).await?;
                report.produced += 1;
                pending.clear();
            }
        }
        if !pending.is_empty() {
            self.write_batch(&pending, modified).await?;
            report.produced += 1;
        }

        self.stats.lines_read += report.consumed;
        self.stats.lines_filtered += report.dropped;
        metrics::counter!(m::COLLECTOR_LINES_READ_TOTAL).increment(report.consumed);
        metrics::counter!(m::COLLECTOR_LINES_FILTERED_TOTAL).increment(report.dropped);

        // filtered or empty lines after the last batch
        if self.cursor.byte_offset < chunk.end_offset {
            self.cursor.byte_offset = chunk.end_offset;
            self.cursor.last_modified = modified;
            self.persist().await?;
        }
        Ok(report)
    }

    async fn write_batch(
        &mut self,
        lines: &[&SourceLine],
        modified: Option<DateTime<Utc>>,
    ) -> Result<(), LogPipelineError> {
        let Some(last) = lines.last() else {
            return Ok(());
        };

        let mut body = String::with_capacity(lines.iter().map(|l| l.text.len() + 1).sum());
        for line in lines {
            body.push_str(&line.text);
            body.push('\n');
        }

        let seq = self.next_seq;
        let name = BATCH_FILES.file_name(seq);
        queue::publish(&self.config.output_dir, &name, body.as_bytes()).await?;

        self.next_seq += 1;
        self.cursor.last_sequence = seq;
        self.cursor.byte_offset = last.end_offset;
        self.cursor.last_modified = modified;
        self.persist().await?;

        self.stats.batches_written += 1;
        metrics::counter!(m::COLLECTOR_BATCHES_WRITTEN_TOTAL).increment(1);
        debug!(batch = %name, lines = lines.len(), offset = self.cursor.byte_offset, "batch published");
        Ok(())
    }

    async fn persist(&self) -> Result<(), LogPipelineError> {
        self.state.save(&self.cursor).await?;
        Ok(())
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }
}

impl Stage for Collector {
    fn name(&self) -> &'static str {
        "collector"
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    async fn poll_once(&mut self) -> Result<CycleReport, LogPipelineError> {
        self.collect().await
    }
}
