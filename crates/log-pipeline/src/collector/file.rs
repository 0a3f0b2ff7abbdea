//! Reading complete lines from a growing source file.
//!
//! Only bytes up to the last `\n` of a read are consumed; a trailing partial
//! line stays in the file and is read again once its newline arrives. A chunk
//! that fills the whole read window without any newline is consumed as one
//! line so a runaway writer cannot stall the collector; the rest of that line
//! becomes the next record and the chunk is flagged as `split`.

use std::io::SeekFrom;
use std::path::Path;

use bytes::BytesMut;
use chrono::{DateTime, Utc};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Upper bound on bytes read per chunk.
pub const MAX_CHUNK_BYTES: u64 = 4 * 1024 * 1024;

/// Observed state of the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceStat {
    pub size: u64,
    pub inode: Option<u64>,
    pub modified: Option<DateTime<Utc>>,
}

/// One complete line and the offset just past its terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLine {
    pub text: String,
    pub end_offset: u64,
}

/// Lines read in one chunk.
#[derive(Debug, Default)]
pub struct LineChunk {
    /// Non-empty lines in file order
    pub lines: Vec<SourceLine>,
    /// Offset just past the last consumed byte, including skipped empty lines
    pub end_offset: u64,
    /// Bytes consumed by this chunk
    pub consumed: u64,
    /// The last line had no newline within the read window and was cut
    pub split: bool,
}

/// Stats `path`. A missing file is `Ok(None)`.
pub async fn stat(path: &Path) -> std::io::Result<Option<SourceStat>> {
    let meta = match tokio::fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    Ok(Some(SourceStat {
        size: meta.len(),
        inode: inode_of(&meta),
        modified: meta.modified().ok().map(DateTime::<Utc>::from),
    }))
}

#[cfg(unix)]
fn inode_of(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;
    Some(meta.ino())
}

#[cfg(not(unix))]
fn inode_of(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Reads complete lines from `path` between `offset` and `limit`.
///
/// At most `max_chunk` bytes are read. `consumed == 0` means only a partial
/// line is available.
pub async fn read_lines(
    path: &Path,
    offset: u64,
    limit: u64,
    max_chunk: u64,
) -> std::io::Result<LineChunk> {
    let window = limit.saturating_sub(offset).min(max_chunk);
    if window == 0 {
        return Ok(LineChunk {
            end_offset: offset,
            ..LineChunk::default()
        });
    }

    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(offset)).await?;

    let mut buf = BytesMut::with_capacity(window as usize);
    let mut reader = file.take(window);
    while reader.read_buf(&mut buf).await? > 0 {}

    let (usable, split) = match buf.iter().rposition(|&b| b == b'\n') {
        Some(pos) => (pos + 1, false),
        // oversized line with no newline in the whole window
        None if buf.len() as u64 == max_chunk => (buf.len(), true),
        None => (0, false),
    };

    let mut chunk = LineChunk {
        end_offset: offset + usable as u64,
        consumed: usable as u64,
        split,
        ..LineChunk::default()
    };

    let mut pos = offset;
    for raw in buf[..usable].split_inclusive(|&b| b == b'\n') {
        pos += raw.len() as u64;
        let body = raw.strip_suffix(b"\n").unwrap_or(raw);
        let body = body.strip_suffix(b"\r").unwrap_or(body);
        if body.is_empty() {
            continue;
        }
        chunk.lines.push(SourceLine {
            text: String::from_utf8_lossy(body).into_owned(),
            end_offset: pos,
        });
    }
    Ok(chunk)
}
