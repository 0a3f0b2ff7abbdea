//! Segment files: naming, listing and lifecycle state.
//!
//! A segment is named `segment_<seq>_<YYYYMMDDTHHMMSSZ>.ndjson`, with `.gz`
//! appended once compressed. The sequence orders segments; the timestamp is
//! the time the segment was opened.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Serialize;

use logflow_core::state::is_temp_file;

use crate::error::LogPipelineError;

pub const SEGMENT_PREFIX: &str = "segment_";
pub const PLAIN_SUFFIX: &str = ".ndjson";
pub const GZIP_SUFFIX: &str = ".ndjson.gz";
const TIME_FORMAT: &str = "%Y%m%dT%H%M%SZ";
const SEQ_WIDTH: usize = 10;

/// Lifecycle of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SegmentState {
    /// Receiving appends
    Active,
    /// Rotated out, stored uncompressed
    Closed,
    /// Rotated out and gzip-compressed
    Compressed,
}

impl fmt::Display for SegmentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Active => "active",
            Self::Closed => "closed",
            Self::Compressed => "compressed",
        })
    }
}

/// Parsed segment file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentName {
    pub seq: u64,
    pub start_time: DateTime<Utc>,
    pub compressed: bool,
}

impl SegmentName {
    /// Name of a fresh uncompressed segment. Sub-second precision is dropped.
    pub fn new(seq: u64, start_time: DateTime<Utc>) -> Self {
        let start_time = DateTime::from_timestamp(start_time.timestamp(), 0).unwrap_or(start_time);
        Self {
            seq,
            start_time,
            compressed: false,
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{SEGMENT_PREFIX}{:0width$}_{}{}",
            self.seq,
            self.start_time.format(TIME_FORMAT),
            if self.compressed { GZIP_SUFFIX } else { PLAIN_SUFFIX },
            width = SEQ_WIDTH
        )
    }

    /// Same segment after compression.
    pub fn compressed(self) -> Self {
        Self {
            compressed: true,
            ..self
        }
    }

    /// Same segment before compression.
    pub fn plain(self) -> Self {
        Self {
            compressed: false,
            ..self
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        let rest = name.strip_prefix(SEGMENT_PREFIX)?;
        let (stem, compressed) = match rest.strip_suffix(GZIP_SUFFIX) {
            Some(stem) => (stem, true),
            None => (rest.strip_suffix(PLAIN_SUFFIX)?, false),
        };
        let (seq, time) = stem.split_once('_')?;
        if seq.is_empty() || !seq.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let start_time = NaiveDateTime::parse_from_str(time, TIME_FORMAT)
            .ok()?
            .and_utc();
        Some(Self {
            seq: seq.parse().ok()?,
            start_time,
            compressed,
        })
    }
}

/// A segment file on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub name: String,
    pub path: PathBuf,
    pub seq: u64,
    pub start_time: DateTime<Utc>,
    pub size_bytes: u64,
    pub state: SegmentState,
}

impl Segment {
    pub fn is_compressed(&self) -> bool {
        self.state == SegmentState::Compressed
    }
}

/// Lists segments in `dir` in ascending sequence order.
///
/// When both the plain and the compressed file of one segment exist (a
/// compression that did not finish removing its input), only the compressed
/// file is listed. `active` marks the segment named by the storage state.
pub async fn list_segments(dir: &Path, active: Option<&str>) -> Result<Vec<Segment>, LogPipelineError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LogPipelineError::read(dir, e)),
    };

    let mut segments: Vec<Segment> = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LogPipelineError::read(dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_temp_file(&name) {
            continue;
        }
        let Some(parsed) = SegmentName::parse(&name) else {
            continue;
        };
        let meta = entry
            .metadata()
            .await
            .map_err(|e| LogPipelineError::read(entry.path(), e))?;
        if !meta.is_file() {
            continue;
        }
        let size_bytes = meta.len();
        let state = if parsed.compressed {
            SegmentState::Compressed
        } else if active == Some(name.as_str()) {
            SegmentState::Active
        } else {
            SegmentState::Closed
        };
        segments.push(Segment {
            path: entry.path(),
            name,
            seq: parsed.seq,
            start_time: parsed.start_time,
            size_bytes,
            state,
        });
    }

    segments.sort_by_key(|s| (s.seq, s.is_compressed()));
    // keep the compressed copy when both exist
    let mut deduped: Vec<Segment> = Vec::with_capacity(segments.len());
    for segment in segments {
        match deduped.last_mut() {
            Some(last) if last.seq == segment.seq => *last = segment,
            _ => deduped.push(segment),
        }
    }
    Ok(deduped)
}
