//! Persisted read position of the collector.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where the collector has read up to.
///
/// `byte_offset` always points just past a newline (or at 0). It only moves
/// forward except when the source is truncated or replaced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceCursor {
    pub path: PathBuf,
    pub byte_offset: u64,
    #[serde(default)]
    pub last_modified: Option<DateTime<Utc>>,
    /// Inode of the file the offset refers to (unix only)
    #[serde(default)]
    pub inode: Option<u64>,
    /// Highest batch sequence written so far
    #[serde(default)]
    pub last_sequence: u64,
}

impl SourceCursor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            byte_offset: 0,
            last_modified: None,
            inode: None,
            last_sequence: 0,
        }
    }

    /// Whether this cursor tracks `path`.
    pub fn tracks(&self, path: &Path) -> bool {
        self.path == path
    }

    /// Whether the observed file means the offset no longer applies.
    ///
    /// A file shorter than the offset was truncated; a different inode means
    /// the path now names another file.
    pub fn is_stale(&self, size: u64, inode: Option<u64>) -> bool {
        if size < self.byte_offset {
            return true;
        }
        matches!((self.inode, inode), (Some(known), Some(seen)) if known != seen)
    }

    /// Restarts reading from the beginning of the file.
    pub fn reset(&mut self, inode: Option<u64>) {
        self.byte_offset = 0;
        self.inode = inode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shrinking_file_is_stale() {
        let mut cursor = SourceCursor::new("/var/log/app.log");
        cursor.byte_offset = 100;
        assert!(cursor.is_stale(50, None));
        assert!(!cursor.is_stale(100, None));
        assert!(!cursor.is_stale(150, None));
    }

    #[test]
    fn inode_change_is_stale() {
        let mut cursor = SourceCursor::new("/var/log/app.log");
        cursor.byte_offset = 10;
        cursor.inode = Some(7);
        assert!(cursor.is_stale(20, Some(8)));
        assert!(!cursor.is_stale(20, Some(7)));
        // unknown inode on either side never triggers a reset
        assert!(!cursor.is_stale(20, None));
    }

    #[test]
    fn reset_moves_to_start() {
        let mut cursor = SourceCursor::new("a.log");
        cursor.byte_offset = 42;
        cursor.last_sequence = 5;
        cursor.reset(Some(9));
        assert_eq!(cursor.byte_offset, 0);
        assert_eq!(cursor.inode, Some(9));
        assert_eq!(cursor.last_sequence, 5);
    }

    #[test]
    fn older_state_without_optional_fields_loads() {
        let cursor: SourceCursor =
            serde_json::from_str(r#"{"path":"/var/log/app.log","byte_offset":12}"#).unwrap();
        assert_eq!(cursor.byte_offset, 12);
        assert_eq!(cursor.inode, None);
        assert_eq!(cursor.last_sequence, 0);
    }
}
