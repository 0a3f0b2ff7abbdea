//! Durable stage state.
//!
//! Every stage owns exactly one JSON state file. Writes go to a hidden
//! temporary file in the same directory, are fsynced and then renamed over the
//! destination, so a reader sees either the previous or the new record and
//! never a torn one. The same primitive publishes queue files between stages.
//!
//! A state file that exists but cannot be read or decoded is reported as
//! [`StateError`]; callers treat it as fatal rather than starting from zero.

use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncWriteExt;

use crate::error::StateError;

/// Suffix of in-flight temporary files. Pollers skip these.
pub const TEMP_SUFFIX: &str = ".tmp";

/// Writes `contents` to `path` atomically.
///
/// The temporary file starts with `.` and ends with [`TEMP_SUFFIX`] so it
/// never matches a stage's input pattern while being written.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = dir.join(format!(
        ".{}.{}{}",
        file_name,
        uuid::Uuid::new_v4().simple(),
        TEMP_SUFFIX
    ));

    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await?;
        sync_dir(&dir).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

/// Flushes directory metadata so a completed rename survives power loss.
#[cfg(unix)]
pub async fn sync_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::File::open(dir).await?.sync_all().await
}

#[cfg(not(unix))]
pub async fn sync_dir(_dir: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Returns true for temporary files left behind by [`write_atomic`].
pub fn is_temp_file(name: &str) -> bool {
    name.starts_with('.') && name.ends_with(TEMP_SUFFIX)
}

/// Typed handle on a JSON state file.
#[derive(Debug, Clone)]
pub struct StateFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> StateFile<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the record. A missing file is `Ok(None)`.
    pub async fn load(&self) -> Result<Option<T>, StateError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(StateError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| StateError::Corrupt {
                path: self.path.clone(),
                reason: e.to_string(),
            })
    }

    /// Persists the record atomically, creating the parent directory if needed.
    pub async fn save(&self, value: &T) -> Result<(), StateError> {
        let body = serde_json::to_vec_pretty(value)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| StateError::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }
        write_atomic(&self.path, &body)
            .await
            .map_err(|source| StateError::Write {
                path: self.path.clone(),
                source,
            })
    }
}
