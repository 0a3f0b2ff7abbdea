//! Directory queues between stages.
//!
//! A producer publishes each file under its final name with
//! [`logflow_core::state::write_atomic`], so a file that exists under a
//! matching name is complete and never changes again. Consumers list matching
//! names, order them by the zero-padded sequence embedded in the name and
//! process the ones past their cursor.

use std::path::{Path, PathBuf};

use logflow_core::state::{is_temp_file, write_atomic};

use crate::error::LogPipelineError;

/// Naming scheme of one queue: `{prefix}{seq:0width$}{suffix}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueKind {
    pub prefix: &'static str,
    pub suffix: &'static str,
    pub width: usize,
}

/// Collector output.
pub const BATCH_FILES: QueueKind = QueueKind {
    prefix: "batch_",
    suffix: ".log",
    width: 12,
};

/// Parser output.
pub const PARSED_FILES: QueueKind = QueueKind {
    prefix: "parsed_",
    suffix: ".ndjson",
    width: 12,
};

impl QueueKind {
    /// File name for sequence `seq`.
    pub fn file_name(&self, seq: u64) -> String {
        format!(
            "{}{:0width$}{}",
            self.prefix,
            seq,
            self.suffix,
            width = self.width
        )
    }

    /// Sequence encoded in `name`, if it belongs to this queue.
    pub fn sequence_of(&self, name: &str) -> Option<u64> {
        let digits = name.strip_prefix(self.prefix)?.strip_suffix(self.suffix)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok()
    }
}

/// A published queue file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueFile {
    pub seq: u64,
    pub name: String,
    pub path: PathBuf,
}

/// Lists the queue's files in `dir` in ascending sequence order.
///
/// A missing directory is an empty queue.
pub async fn list(dir: &Path, kind: QueueKind) -> Result<Vec<QueueFile>, LogPipelineError> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(LogPipelineError::read(dir, e)),
    };

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LogPipelineError::read(dir, e))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_temp_file(&name) {
            continue;
        }
        if let Some(seq) = kind.sequence_of(&name) {
            files.push(QueueFile {
                seq,
                path: entry.path(),
                name,
            });
        }
    }
    files.sort_by_key(|f| f.seq);
    Ok(files)
}

/// Files with a sequence strictly greater than `after`.
pub async fn list_after(
    dir: &Path,
    kind: QueueKind,
    after: Option<u64>,
) -> Result<Vec<QueueFile>, LogPipelineError> {
    let mut files = list(dir, kind).await?;
    if let Some(after) = after {
        files.retain(|f| f.seq > after);
    }
    Ok(files)
}

/// Highest sequence present in `dir`, if any.
pub async fn highest_sequence(dir: &Path, kind: QueueKind) -> Result<Option<u64>, LogPipelineError> {
    Ok(list(dir, kind).await?.last().map(|f| f.seq))
}

/// Publishes `contents` as `dir/name` atomically.
pub async fn publish(dir: &Path, name: &str, contents: &[u8]) -> Result<PathBuf, LogPipelineError> {
    let path = dir.join(name);
    write_atomic(&path, contents)
        .await
        .map_err(|e| LogPipelineError::write(&path, e))?;
    Ok(path)
}

/// Creates `dir` (and parents) if missing.
pub async fn ensure_dir(dir: &Path) -> Result<(), LogPipelineError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| LogPipelineError::write(dir, e))
}
