//! Storage stage: appends parsed entries to rotating NDJSON segments.
//!
//! Exactly one segment is Active at a time. Each parser output file is
//! appended to it with a single write followed by `fsync`, then the
//! [`RotationState`] is persisted. After every append, and once per poll, the
//! [`RotationPolicy`] decides whether the Active segment is rotated: it is
//! closed, optionally gzip-compressed, and a new Active segment is opened
//! before the state naming it is persisted.
//!
//! Every append also updates the level and date [`SegmentIndex`] before the
//! state is persisted, so indexed offsets never point past recorded data.
//!
//! # Recovery
//! On open, bytes past the recorded size of the Active segment (an append
//! whose state update never landed) are truncated away. A rotation that was
//! interrupted after compressing the old segment or after creating the new one
//! is completed rather than redone. The index is then brought in line with
//! the segments on disk: the Active segment is always re-indexed, as is any
//! segment missing from the index catalog.

pub mod compress;
pub mod index;
pub mod rotation;
pub mod segment;

pub use index::{IndexKey, IndexKind, SegmentIndex, SegmentPostings};
pub use rotation::{RotationPolicy, RotationState, RotationTrigger};
pub use segment::{Segment, SegmentName, SegmentState, list_segments};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use logflow_core::config::StorageConfig;
use logflow_core::metrics as m;
use logflow_core::state::{StateFile, sync_dir};

use crate::error::LogPipelineError;
use crate::queue::{self, PARSED_FILES, QueueFile};
use crate::runner::{CycleReport, Stage};

/// Counters since the stage was opened.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StorageStats {
    pub files_ingested: u64,
    pub entries_appended: u64,
    pub bytes_appended: u64,
    pub rotations: u64,
    pub compression_failures: u64,
    /// Segments re-indexed from their contents
    pub segments_reindexed: u64,
}

/// The storage stage.
pub struct StorageStage {
    config: StorageConfig,
    policy: RotationPolicy,
    state_file: StateFile<RotationState>,
    state: RotationState,
    stats: StorageStats,
    index: SegmentIndex,
    /// Segments with complete postings, including the Active one
    catalog: BTreeSet<String>,
    /// Postings of the Active segment
    postings: SegmentPostings,
}

impl StorageStage {
    /// Loads or initialises the rotation state and repairs the segment
    /// directory after an unclean shutdown.
    pub async fn open(config: &StorageConfig) -> Result<Self, LogPipelineError> {
        queue::ensure_dir(&config.storage_dir).await?;
        let state_file = StateFile::new(&config.state_file);
        let loaded = state_file.load().await?;
        let now = Utc::now();

        let mut stage = Self {
            config: config.clone(),
            policy: RotationPolicy::from_config(config),
            state_file,
            state: RotationState {
                active_segment_name: String::new(),
                size_bytes: 0,
                start_time: now,
                last_processed_input: None,
                next_sequence: 1,
            },
            stats: StorageStats::default(),
            index: SegmentIndex::new(&config.storage_dir),
            catalog: BTreeSet::new(),
            postings: SegmentPostings::default(),
        };

        match loaded {
            Some(state) => stage.recover(state, now).await?,
            None => stage.initialise(now).await?,
        }
        stage.state_file.save(&stage.state).await?;
        stage.settle_closed_segments().await?;
        stage.reindex().await?;

        metrics::gauge!(m::STORAGE_ACTIVE_SEGMENT_BYTES).set(stage.state.size_bytes as f64);
        info!(
            active = %stage.state.active_segment_name,
            size_bytes = stage.state.size_bytes,
            last_input = stage.state.last_processed_input.as_deref().unwrap_or("-"),
            "storage opened"
        );
        Ok(stage)
    }

    pub fn state(&self) -> &RotationState {
        &self.state
    }

    pub fn stats(&self) -> StorageStats {
        self.stats
    }

    pub fn storage_dir(&self) -> &Path {
        &self.config.storage_dir
    }

    pub fn index(&self) -> &SegmentIndex {
        &self.index
    }

    /// Path of the Active segment.
    pub fn active_path(&self) -> PathBuf {
        self.config.storage_dir.join(&self.state.active_segment_name)
    }

    /// Appends every parser output file past the cursor.
    pub async fn ingest_pending(&mut self) -> Result<CycleReport, LogPipelineError> {
        let after = self
            .state
            .last_processed_input
            .as_deref()
            .and_then(|name| PARSED_FILES.sequence_of(name));
        let pending = queue::list_after(&self.config.input_dir, PARSED_FILES, after).await?;

        let mut report = CycleReport::default();
        for file in pending {
            report.merge(self.append_file(&file).await?);
            self.rotate_if_due(Utc::now()).await?;
        }
        // idle age check
        self.rotate_if_due(Utc::now()).await?;
        Ok(report)
    }

    async fn append_file(&mut self, file: &QueueFile) -> Result<CycleReport, LogPipelineError> {
        let mut body = tokio::fs::read(&file.path)
            .await
            .map_err(|e| LogPipelineError::read(&file.path, e))?;
        if !body.is_empty() && !body.ends_with(b"\n") {
            body.push(b'\n');
        }
        let entries = body
            .split(|&b| b == b'\n')
            .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
            .count() as u64;

        if !body.is_empty() {
            let path = self.active_path();
            if let Err(e) = append_synced(&path, &body).await {
                self.discard_partial_append(&path).await?;
                return Err(LogPipelineError::write(&path, e));
            }
            let added = SegmentPostings::scan(&body, self.state.size_bytes);
            self.index_append(added).await?;
        }

        self.state.size_bytes += body.len() as u64;
        self.state.last_processed_input = Some(file.name.clone());
        self.state_file.save(&self.state).await?;

        self.stats.files_ingested += 1;
        self.stats.entries_appended += entries;
        self.stats.bytes_appended += body.len() as u64;
        metrics::counter!(m::STORAGE_ENTRIES_APPENDED_TOTAL).increment(entries);
        metrics::counter!(m::STORAGE_BYTES_APPENDED_TOTAL).increment(body.len() as u64);
        metrics::gauge!(m::STORAGE_ACTIVE_SEGMENT_BYTES).set(self.state.size_bytes as f64);
        debug!(input = %file.name, entries, size_bytes = self.state.size_bytes, "appended");

        Ok(CycleReport {
            consumed: 1,
            produced: entries,
            dropped: 0,
        })
    }

    /// Publishes postings of freshly appended lines of the Active segment.
    async fn index_append(&mut self, added: SegmentPostings) -> Result<(), LogPipelineError> {
        if added.is_empty() {
            return Ok(());
        }
        let touched: Vec<IndexKey> = added.keys().cloned().collect();
        self.postings.merge(added);
        let segment = self.active_plain_name()?;
        self.index
            .put(&segment, &self.postings, &touched)
            .await
            .map_err(|e| index_error(format!("cannot index {segment}"), e))
    }

    /// Cuts a failed append back to the recorded size.
    async fn discard_partial_append(&self, path: &Path) -> Result<(), LogPipelineError> {
        truncate_to(path, self.state.size_bytes).await.map_err(|e| {
            LogPipelineError::Storage(format!(
                "cannot roll back partial append to {}: {e}",
                path.display()
            ))
        })
    }

    /// Rotates the Active segment if the policy says it is due at `now`.
    pub async fn rotate_if_due(
        &mut self,
        now: DateTime<Utc>,
    ) -> Result<Option<RotationTrigger>, LogPipelineError> {
        let Some(trigger) = self.policy.due(&self.state, now) else {
            return Ok(None);
        };
        self.rotate(trigger, now).await?;
        Ok(Some(trigger))
    }

    async fn rotate(&mut self, trigger: RotationTrigger, now: DateTime<Utc>) -> Result<(), LogPipelineError> {
        let closing = self.active_name()?;
        let closed_as = if self.config.compression_enabled {
            self.compress(closing).await
        } else {
            SegmentState::Closed
        };

        let seq = self.state.next_sequence;
        let next = self.create_segment(seq, now).await?;
        self.postings = SegmentPostings::default();
        self.catalog.insert(next.file_name());
        self.save_catalog().await?;
        self.state = RotationState {
            active_segment_name: next.file_name(),
            size_bytes: 0,
            start_time: next.start_time,
            last_processed_input: self.state.last_processed_input.take(),
            next_sequence: seq + 1,
        };
        self.state_file.save(&self.state).await?;

        self.stats.rotations += 1;
        metrics::counter!(m::STORAGE_ROTATIONS_TOTAL).increment(1);
        metrics::gauge!(m::STORAGE_ACTIVE_SEGMENT_BYTES).set(0.0);
        info!(
            closed = %closing.file_name(),
            closed_as = %closed_as,
            trigger = %trigger,
            active = %self.state.active_segment_name,
            "segment rotated"
        );
        Ok(())
    }

    /// Gzips a closed segment. Failure leaves it Closed.
    async fn compress(&mut self, name: SegmentName) -> SegmentState {
        let plain = self.config.storage_dir.join(name.plain().file_name());
        let target = self.config.storage_dir.join(name.compressed().file_name());
        match compress::compress_file(&plain, &target).await {
            Ok(_) => SegmentState::Compressed,
            Err(e) => {
                self.stats.compression_failures += 1;
                metrics::counter!(m::STORAGE_COMPRESSION_FAILURES_TOTAL).increment(1);
                warn!(
                    segment = %plain.display(),
                    error = %e,
                    "compression failed, segment kept uncompressed"
                );
                SegmentState::Closed
            }
        }
    }

    async fn create_segment(&self, seq: u64, now: DateTime<Utc>) -> Result<SegmentName, LogPipelineError> {
        let name = SegmentName::new(seq, now);
        let path = self.config.storage_dir.join(name.file_name());
        let created = async {
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .await?;
            file.sync_all().await?;
            sync_dir(&self.config.storage_dir).await
        }
        .await;
        created.map_err(|e| {
            LogPipelineError::Storage(format!("cannot create segment {}: {e}", path.display()))
        })?;
        Ok(name)
    }

    fn active_plain_name(&self) -> Result<String, LogPipelineError> {
        Ok(self.active_name()?.plain().file_name())
    }

    async fn save_catalog(&self) -> Result<(), LogPipelineError> {
        self.index
            .save_catalog(&self.catalog)
            .await
            .map_err(|e| index_error("cannot save index catalog", e))
    }

    /// Brings the index in line with the segments on disk.
    ///
    /// A damaged manifest or catalog discards the whole index and rebuilds it
    /// from every segment.
    async fn reindex(&mut self) -> Result<(), LogPipelineError> {
        match self.reindex_from(false).await {
            Err(ReindexError::Damaged(e)) => {
                warn!(index = %self.index.root().display(), error = %e, "index damaged, rebuilding from segments");
                self.index
                    .clear()
                    .await
                    .map_err(|e| index_error("cannot clear index", e))?;
                self.reindex_from(true).await.map_err(ReindexError::into_pipeline)
            }
            other => other.map_err(ReindexError::into_pipeline),
        }
    }

    async fn reindex_from(&mut self, full: bool) -> Result<(), ReindexError> {
        let segments =
            list_segments(&self.config.storage_dir, Some(&self.state.active_segment_name)).await?;
        let catalog = if full {
            BTreeSet::new()
        } else {
            self.index.catalog().await.map_err(ReindexError::from_io)?
        };

        let mut live = BTreeSet::new();
        let mut replaced = BTreeMap::new();
        for segment in &segments {
            let Some(name) = SegmentName::parse(&segment.name) else {
                continue;
            };
            let plain = name.plain().file_name();
            live.insert(plain.clone());
            let active = segment.state == SegmentState::Active;
            if !active && catalog.contains(&plain) {
                continue;
            }
            let bytes = compress::read_segment(&segment.path, segment.is_compressed())
                .await
                .map_err(|e| LogPipelineError::read(&segment.path, e))?;
            let postings = SegmentPostings::scan(&bytes, 0);
            if active {
                self.postings = postings.clone();
            }
            replaced.insert(plain, postings);
        }

        self.index
            .rebuild(&live, &replaced)
            .await
            .map_err(ReindexError::from_io)?;
        self.catalog = live;
        self.save_catalog().await?;

        // the Active segment is re-indexed on every open
        let rebuilt = replaced.len().saturating_sub(1) as u64;
        self.stats.segments_reindexed += rebuilt;
        if rebuilt > 0 {
            info!(segments = rebuilt, "re-indexed segments missing from the index");
        }
        Ok(())
    }

    fn active_name(&self) -> Result<SegmentName, LogPipelineError> {
        SegmentName::parse(&self.state.active_segment_name).ok_or_else(|| {
            LogPipelineError::Storage(format!(
                "state names an invalid segment: {:?}",
                self.state.active_segment_name
            ))
        })
    }

    /// First start: open a segment past any existing ones.
    async fn initialise(&mut self, now: DateTime<Utc>) -> Result<(), LogPipelineError> {
        let existing = list_segments(&self.config.storage_dir, None).await?;
        if !existing.is_empty() {
            warn!(
                segments = existing.len(),
                "no storage state found but segments exist, starting a new segment"
            );
        }
        let seq = existing.last().map_or(1, |s| s.seq + 1);
        let name = self.create_segment(seq, now).await?;
        self.state = RotationState {
            active_segment_name: name.file_name(),
            size_bytes: 0,
            start_time: name.start_time,
            last_processed_input: None,
            next_sequence: seq + 1,
        };
        Ok(())
    }

    async fn recover(&mut self, state: RotationState, now: DateTime<Utc>) -> Result<(), LogPipelineError> {
        self.state = state;
        let active = self.active_name()?;
        self.state.next_sequence = self.state.next_sequence.max(active.seq + 1);

        let segments =
            list_segments(&self.config.storage_dir, Some(&self.state.active_segment_name)).await?;

        // rotation created the next segment but its state was never persisted
        if let Some(newer) = segments
            .iter()
            .filter(|s| s.seq > active.seq && !s.is_compressed())
            .next_back()
        {
            warn!(
                recorded = %self.state.active_segment_name,
                adopted = %newer.name,
                "completing interrupted rotation, adopting newer segment"
            );
            self.state.active_segment_name = newer.name.clone();
            self.state.size_bytes = newer.size_bytes;
            self.state.start_time = newer.start_time;
            self.state.next_sequence = self.state.next_sequence.max(newer.seq + 1);
            return Ok(());
        }

        let plain = self.config.storage_dir.join(active.plain().file_name());
        match tokio::fs::metadata(&plain).await {
            Ok(meta) => {
                let len = meta.len();
                if len > self.state.size_bytes {
                    warn!(
                        segment = %plain.display(),
                        recorded = self.state.size_bytes,
                        actual = len,
                        "discarding unrecorded append"
                    );
                    truncate_to(&plain, self.state.size_bytes).await.map_err(|e| {
                        LogPipelineError::Storage(format!("cannot truncate {}: {e}", plain.display()))
                    })?;
                } else if len < self.state.size_bytes {
                    warn!(
                        segment = %plain.display(),
                        recorded = self.state.size_bytes,
                        actual = len,
                        "active segment shorter than recorded"
                    );
                    self.state.size_bytes = len;
                }
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let compressed = segments.iter().any(|s| s.seq == active.seq && s.is_compressed());
                if compressed {
                    info!(segment = %active.file_name(), "completing interrupted rotation");
                } else {
                    warn!(segment = %active.file_name(), "active segment missing, opening a new one");
                }
                let highest = segments.last().map_or(0, |s| s.seq);
                let seq = self.state.next_sequence.max(highest + 1);
                let next = self.create_segment(seq, now).await?;
                self.state.active_segment_name = next.file_name();
                self.state.size_bytes = 0;
                self.state.start_time = next.start_time;
                self.state.next_sequence = seq + 1;
                Ok(())
            }
            Err(e) => Err(LogPipelineError::read(&plain, e)),
        }
    }

    /// Removes plain copies of compressed segments and compresses closed
    /// segments left behind by an earlier run.
    async fn settle_closed_segments(&mut self) -> Result<(), LogPipelineError> {
        let segments =
            list_segments(&self.config.storage_dir, Some(&self.state.active_segment_name)).await?;
        for segment in segments {
            let Some(name) = SegmentName::parse(&segment.name) else {
                continue;
            };
            match segment.state {
                SegmentState::Compressed => {
                    let plain = self.config.storage_dir.join(name.plain().file_name());
                    if tokio::fs::try_exists(&plain).await.unwrap_or(false) {
                        info!(segment = %plain.display(), "removing plain copy of compressed segment");
                        if let Err(e) = tokio::fs::remove_file(&plain).await {
                            warn!(segment = %plain.display(), error = %e, "cannot remove plain copy");
                        }
                    }
                }
                SegmentState::Closed if self.config.compression_enabled => {
                    self.compress(name).await;
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl Stage for StorageStage {
    fn name(&self) -> &'static str {
        "storage"
    }

    fn poll_interval(&self) -> Duration {
        self.config.poll_interval()
    }

    async fn poll_once(&mut self) -> Result<CycleReport, LogPipelineError> {
        self.ingest_pending().await
    }
}

/// Failure while bringing the index in line with the segments.
enum ReindexError {
    /// A manifest or the catalog did not decode
    Damaged(std::io::Error),
    Other(LogPipelineError),
}

impl ReindexError {
    fn from_io(e: std::io::Error) -> Self {
        if e.kind() == std::io::ErrorKind::InvalidData {
            Self::Damaged(e)
        } else {
            Self::Other(index_error("cannot rebuild index", e))
        }
    }

    fn into_pipeline(self) -> LogPipelineError {
        match self {
            Self::Damaged(e) => index_error("cannot rebuild index", e),
            Self::Other(e) => e,
        }
    }
}

impl From<LogPipelineError> for ReindexError {
    fn from(e: LogPipelineError) -> Self {
        Self::Other(e)
    }
}

fn index_error(context: impl std::fmt::Display, e: std::io::Error) -> LogPipelineError {
    LogPipelineError::Storage(format!("{context}: {e}"))
}

async fn append_synced(path: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(body).await?;
    file.sync_data().await
}

async fn truncate_to(path: &Path, len: u64) -> std::io::Result<()> {
    let file = tokio::fs::OpenOptions::new().write(true).open(path).await?;
    file.set_len(len).await?;
    file.sync_all().await
}
