//! Segment scanning and index lookups.
//!
//! A filter made only of level and date conditions is answered from the
//! storage index when the index covers every segment; anything else, or an
//! incomplete index, falls back to a full scan. Both paths return the same
//! entries in the same order.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, warn};

use logflow_core::metrics as m;
use logflow_core::types::ParsedEntry;

use super::filter::QueryFilter;
use crate::error::LogPipelineError;
use crate::storage::compress::read_segment;
use crate::storage::index::{IndexKey, SegmentIndex, intersect};
use crate::storage::segment::{Segment, SegmentName, list_segments};

/// Entries found by [`search`].
#[derive(Debug, Default)]
pub struct SearchResult {
    pub entries: Vec<ParsedEntry>,
    /// Stored lines that did not decode as entries
    pub undecodable: u64,
    pub segments_read: usize,
    /// Answered from the level/date index
    pub indexed: bool,
}

/// Collects up to `limit` matching entries, oldest segment first.
pub async fn search(
    storage_dir: &Path,
    filter: &QueryFilter,
    limit: usize,
) -> Result<SearchResult, LogPipelineError> {
    if limit == 0 {
        return Ok(SearchResult::default());
    }
    let segments = list_segments(storage_dir, None).await?;

    if let Some(keys) = filter.index_keys() {
        match search_indexed(storage_dir, &segments, &keys, filter, limit).await? {
            Some(result) => return Ok(result),
            None => debug!(storage = %storage_dir.display(), "index incomplete, scanning segments"),
        }
    }

    let mut result = SearchResult::default();
    for segment in segments {
        let bytes = read_listed(&segment).await?;
        result.segments_read += 1;
        scan(&segment.name, &bytes, filter, limit, &mut result);
        if result.entries.len() >= limit {
            break;
        }
    }
    Ok(result)
}

/// Answers `keys` from the index. `None` when the index does not cover every
/// listed segment or cannot be read.
async fn search_indexed(
    storage_dir: &Path,
    segments: &[Segment],
    keys: &[IndexKey],
    filter: &QueryFilter,
    limit: usize,
) -> Result<Option<SearchResult>, LogPipelineError> {
    let index = SegmentIndex::new(storage_dir);
    let catalog = match index.catalog().await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!(index = %index.root().display(), error = %e, "index catalog unreadable");
            return Ok(None);
        }
    };

    let mut plain_names = Vec::with_capacity(segments.len());
    for segment in segments {
        let Some(name) = SegmentName::parse(&segment.name) else {
            return Ok(None);
        };
        let plain = name.plain().file_name();
        if !catalog.contains(&plain) {
            return Ok(None);
        }
        plain_names.push(plain);
    }

    let mut postings: Option<BTreeMap<String, Vec<u64>>> = None;
    for key in keys {
        let manifest = match index.manifest(key).await {
            Ok(manifest) => manifest,
            Err(e) => {
                warn!(key = %key, error = %e, "index manifest unreadable");
                return Ok(None);
            }
        };
        let found: BTreeMap<String, Vec<u64>> =
            manifest.into_iter().map(|e| (e.segment, e.offsets)).collect();
        postings = Some(match postings {
            None => found,
            Some(previous) => previous
                .into_iter()
                .filter_map(|(segment, offsets)| {
                    let both = intersect(&offsets, found.get(&segment)?);
                    Some((segment, both))
                })
                .collect(),
        });
    }
    let postings = postings.unwrap_or_default();

    let mut result = SearchResult {
        indexed: true,
        ..SearchResult::default()
    };
    for (segment, plain) in segments.iter().zip(&plain_names) {
        let Some(offsets) = postings.get(plain).filter(|o| !o.is_empty()) else {
            continue;
        };
        let bytes = read_listed(segment).await?;
        result.segments_read += 1;
        pick(&segment.name, &bytes, offsets, filter, limit, &mut result);
        if result.entries.len() >= limit {
            break;
        }
    }
    Ok(Some(result))
}

/// Reads a listed segment, following it to its compressed name if it was
/// rotated away between listing and reading.
async fn read_listed(segment: &Segment) -> Result<Vec<u8>, LogPipelineError> {
    match read_segment(&segment.path, segment.is_compressed()).await {
        Ok(bytes) => Ok(bytes),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !segment.is_compressed() => {
            let compressed = SegmentName::parse(&segment.name)
                .map(|name| segment.path.with_file_name(name.compressed().file_name()))
                .ok_or_else(|| LogPipelineError::read(&segment.path, e))?;
            read_segment(&compressed, true)
                .await
                .map_err(|e| LogPipelineError::read(&compressed, e))
        }
        Err(e) => Err(LogPipelineError::read(&segment.path, e)),
    }
}

/// Decodes complete lines of one segment into `result`.
///
/// A trailing line without a newline is an append in progress and skipped.
pub(crate) fn scan(
    segment: &str,
    bytes: &[u8],
    filter: &QueryFilter,
    limit: usize,
    result: &mut SearchResult,
) {
    let complete = match bytes.iter().rposition(|&b| b == b'\n') {
        Some(pos) => &bytes[..=pos],
        None => return,
    };

    for (index, raw) in complete.split(|&b| b == b'\n').enumerate() {
        if result.entries.len() >= limit {
            return;
        }
        if let Err(e) = consider(raw, filter, result) {
            warn!(segment, line = index + 1, error = %e, "skipping undecodable stored line");
        }
    }
}

/// Decodes the lines starting at `offsets` into `result`.
///
/// Offsets that do not start a complete line are ignored.
fn pick(
    segment: &str,
    bytes: &[u8],
    offsets: &[u64],
    filter: &QueryFilter,
    limit: usize,
    result: &mut SearchResult,
) {
    for &offset in offsets {
        if result.entries.len() >= limit {
            return;
        }
        let Some(start) = usize::try_from(offset).ok().filter(|&s| s < bytes.len()) else {
            continue;
        };
        if start > 0 && bytes[start - 1] != b'\n' {
            continue;
        }
        let Some(len) = bytes[start..].iter().position(|&b| b == b'\n') else {
            continue;
        };
        if let Err(e) = consider(&bytes[start..start + len], filter, result) {
            warn!(segment, offset, error = %e, "skipping undecodable stored line");
        }
    }
}

/// Adds one stored line to `result` if it decodes and matches.
fn consider(raw: &[u8], filter: &QueryFilter, result: &mut SearchResult) -> Result<(), serde_json::Error> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() || !filter.matches_line(line) {
        return Ok(());
    }
    match serde_json::from_str::<ParsedEntry>(line) {
        Ok(entry) => {
            if filter.matches_entry(&entry) {
                result.entries.push(entry);
            }
            Ok(())
        }
        Err(e) => {
            result.undecodable += 1;
            metrics::counter!(m::QUERY_UNDECODABLE_LINES_TOTAL).increment(1);
            Err(e)
        }
    }
}
