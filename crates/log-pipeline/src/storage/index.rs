//! Level and date index over stored segments.
//!
//! For every indexed value the storage stage keeps a manifest at
//! `index/<kind>/<value>/manifest.json` listing, per segment, the byte offsets
//! of the lines that carry the value. Offsets are positions in the
//! uncompressed segment, so compression does not invalidate them.
//!
//! `index/segments.json` is the catalog of segments whose postings are
//! complete. A reader only trusts the index when every segment it lists is in
//! the catalog; otherwise it scans.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use logflow_core::state::write_atomic;
use logflow_core::types::UNKNOWN_LEVEL;

use crate::error::LogPipelineError;

/// Index directory inside the storage directory.
pub const INDEX_DIR: &str = "index";
const MANIFEST_FILE: &str = "manifest.json";
const CATALOG_FILE: &str = "segments.json";
const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_VALUE_LEN: usize = 64;

/// What an index key groups entries by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexKind {
    Level,
    Date,
}

impl IndexKind {
    pub const ALL: [IndexKind; 2] = [IndexKind::Level, IndexKind::Date];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Level => "level",
            Self::Date => "date",
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexKind {
    type Err = LogPipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "level" => Ok(Self::Level),
            "date" => Ok(Self::Date),
            other => Err(LogPipelineError::Query(format!(
                "unknown index type '{other}', expected level or date"
            ))),
        }
    }
}

/// One indexed value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexKey {
    pub kind: IndexKind,
    pub value: String,
}

impl IndexKey {
    /// Key for a level, stored uppercase. Levels that are not plain
    /// identifiers are not indexed.
    pub fn level(level: &str) -> Option<Self> {
        let indexable = !level.is_empty()
            && level.len() <= MAX_VALUE_LEN
            && level
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        indexable.then(|| Self {
            kind: IndexKind::Level,
            value: level.to_ascii_uppercase(),
        })
    }

    pub fn date(date: NaiveDate) -> Self {
        Self {
            kind: IndexKind::Date,
            value: date.format(DATE_FORMAT).to_string(),
        }
    }

    /// Parses a user supplied value for `kind`.
    pub fn parse(kind: IndexKind, value: &str) -> Result<Self, LogPipelineError> {
        match kind {
            IndexKind::Level => Self::level(value).ok_or_else(|| {
                LogPipelineError::Query(format!("'{value}' is not an indexable level"))
            }),
            IndexKind::Date => parse_date(value).map(Self::date),
        }
    }

    fn dir(&self, root: &Path) -> PathBuf {
        root.join(self.kind.as_str()).join(&self.value)
    }
}

impl fmt::Display for IndexKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.kind, self.value)
    }
}

/// Parses a `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<NaiveDate, LogPipelineError> {
    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|e| LogPipelineError::Query(format!("invalid date '{value}': {e}")))
}

/// Calendar date of an entry timestamp: its leading `YYYY-MM-DD`, if any.
pub fn entry_date(timestamp: &str) -> Option<NaiveDate> {
    let prefix = timestamp.get(..10)?;
    NaiveDate::parse_from_str(prefix, DATE_FORMAT).ok()
}

#[derive(Deserialize)]
struct IndexedFields {
    timestamp: String,
    #[serde(default)]
    level: Option<String>,
}

/// Offsets of one segment's lines, grouped by key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentPostings {
    offsets: BTreeMap<IndexKey, Vec<u64>>,
}

impl SegmentPostings {
    /// Indexes the complete lines of `bytes`, whose first byte sits at `base`
    /// in the segment. Lines that do not decode are not indexed.
    pub fn scan(bytes: &[u8], base: u64) -> Self {
        let mut postings = Self::default();
        let mut pos = base;
        for raw in bytes.split_inclusive(|&b| b == b'\n') {
            let start = pos;
            pos += raw.len() as u64;
            if !raw.ends_with(b"\n") {
                break;
            }
            let Ok(fields) = serde_json::from_slice::<IndexedFields>(raw) else {
                continue;
            };
            let level = fields.level.as_deref().unwrap_or(UNKNOWN_LEVEL);
            if let Some(key) = IndexKey::level(level) {
                postings.push(key, start);
            }
            if let Some(date) = entry_date(&fields.timestamp) {
                postings.push(IndexKey::date(date), start);
            }
        }
        postings
    }

    fn push(&mut self, key: IndexKey, offset: u64) {
        self.offsets.entry(key).or_default().push(offset);
    }

    /// Appends postings of later lines.
    pub fn merge(&mut self, later: SegmentPostings) {
        for (key, mut offsets) in later.offsets {
            self.offsets.entry(key).or_default().append(&mut offsets);
        }
    }

    pub fn get(&self, key: &IndexKey) -> &[u64] {
        self.offsets.get(key).map_or(&[], Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &IndexKey> {
        self.offsets.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

/// Postings of one segment inside a manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Uncompressed file name of the segment
    pub segment: String,
    pub offsets: Vec<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Catalog {
    segments: BTreeSet<String>,
}

/// On-disk index of one storage directory.
///
/// Reads return `ErrorKind::InvalidData` for manifests or a catalog that do
/// not decode, so callers can tell damage from I/O failure.
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    root: PathBuf,
}

impl SegmentIndex {
    pub fn new(storage_dir: &Path) -> Self {
        Self {
            root: storage_dir.join(INDEX_DIR),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self, key: &IndexKey) -> PathBuf {
        key.dir(&self.root).join(MANIFEST_FILE)
    }

    /// Postings for `key`. A missing manifest is empty.
    pub async fn manifest(&self, key: &IndexKey) -> std::io::Result<Vec<ManifestEntry>> {
        read_json(&self.manifest_path(key)).await.map(Option::unwrap_or_default)
    }

    async fn write_manifest(&self, key: &IndexKey, entries: &[ManifestEntry]) -> std::io::Result<()> {
        let path = self.manifest_path(key);
        if entries.is_empty() {
            match tokio::fs::remove_file(&path).await {
                Err(e) if e.kind() != ErrorKind::NotFound => return Err(e),
                _ => {}
            }
            // fails harmlessly while a temp file is still inside
            let _ = tokio::fs::remove_dir(key.dir(&self.root)).await;
            return Ok(());
        }
        tokio::fs::create_dir_all(key.dir(&self.root)).await?;
        let body = serde_json::to_vec(entries).map_err(std::io::Error::other)?;
        write_atomic(&path, &body).await
    }

    /// Segments with complete postings. A missing catalog is empty.
    pub async fn catalog(&self) -> std::io::Result<BTreeSet<String>> {
        let catalog: Option<Catalog> = read_json(&self.root.join(CATALOG_FILE)).await?;
        Ok(catalog.unwrap_or_default().segments)
    }

    pub async fn save_catalog(&self, segments: &BTreeSet<String>) -> std::io::Result<()> {
        tokio::fs::create_dir_all(&self.root).await?;
        let body = serde_json::to_vec(&Catalog {
            segments: segments.clone(),
        })
        .map_err(std::io::Error::other)?;
        write_atomic(&self.root.join(CATALOG_FILE), &body).await
    }

    /// Replaces the postings of `segment` for every key in `keys`.
    pub async fn put<'a>(
        &self,
        segment: &str,
        postings: &SegmentPostings,
        keys: impl IntoIterator<Item = &'a IndexKey>,
    ) -> std::io::Result<()> {
        for key in keys {
            let mut entries = self.manifest(key).await?;
            upsert(&mut entries, segment, postings.get(key));
            self.write_manifest(key, &entries).await?;
        }
        Ok(())
    }

    /// Every key with a manifest on disk.
    pub async fn keys(&self) -> std::io::Result<Vec<IndexKey>> {
        let mut keys = Vec::new();
        for kind in IndexKind::ALL {
            let dir = self.root.join(kind.as_str());
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e),
            };
            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }
                if !tokio::fs::try_exists(entry.path().join(MANIFEST_FILE)).await? {
                    continue;
                }
                keys.push(IndexKey {
                    kind,
                    value: entry.file_name().to_string_lossy().into_owned(),
                });
            }
        }
        keys.sort();
        Ok(keys)
    }

    /// Drops postings of segments outside `live` and installs `replaced`.
    pub async fn rebuild(
        &self,
        live: &BTreeSet<String>,
        replaced: &BTreeMap<String, SegmentPostings>,
    ) -> std::io::Result<()> {
        let mut keys: BTreeSet<IndexKey> = self.keys().await?.into_iter().collect();
        keys.extend(replaced.values().flat_map(|p| p.keys().cloned()));

        for key in &keys {
            let mut entries = self.manifest(key).await?;
            let before = entries.clone();
            entries.retain(|e| live.contains(&e.segment) && !replaced.contains_key(&e.segment));
            for (segment, postings) in replaced {
                upsert(&mut entries, segment, postings.get(key));
            }
            if entries != before {
                self.write_manifest(key, &entries).await?;
            }
        }
        Ok(())
    }

    /// Removes the whole index.
    pub async fn clear(&self) -> std::io::Result<()> {
        match tokio::fs::remove_dir_all(&self.root).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }
}

/// Sets the offsets of `segment`, keeping entries ordered by segment name.
fn upsert(entries: &mut Vec<ManifestEntry>, segment: &str, offsets: &[u64]) {
    match entries.binary_search_by(|e| e.segment.as_str().cmp(segment)) {
        Ok(i) if offsets.is_empty() => {
            entries.remove(i);
        }
        Ok(i) => entries[i].offsets = offsets.to_vec(),
        Err(_) if offsets.is_empty() => {}
        Err(i) => entries.insert(
            i,
            ManifestEntry {
                segment: segment.to_owned(),
                offsets: offsets.to_vec(),
            },
        ),
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> std::io::Result<Option<T>> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| std::io::Error::new(ErrorKind::InvalidData, format!("{}: {e}", path.display())))
}

/// Sorted offsets present in both lists.
pub fn intersect(a: &[u64], b: &[u64]) -> Vec<u64> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}
