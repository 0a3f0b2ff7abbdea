//! Gzip compression of closed segments and transparent reads.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;

use logflow_core::state::write_atomic;

/// Compresses `plain` into `target`, publishes it atomically and removes
/// `plain`.
///
/// On error `plain` is left untouched and no file exists under `target`.
pub async fn compress_file(plain: &Path, target: &Path) -> std::io::Result<PathBuf> {
    let source = plain.to_path_buf();
    let encoded = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut input = std::fs::File::open(&source)?;
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        std::io::copy(&mut input, &mut encoder)?;
        encoder.flush()?;
        encoder.finish()
    })
    .await
    .map_err(std::io::Error::other)??;

    write_atomic(target, &encoded).await?;
    tokio::fs::remove_file(plain).await?;
    Ok(target.to_path_buf())
}

/// Reads a segment, decompressing it when `compressed` is set.
pub async fn read_segment(path: &Path, compressed: bool) -> std::io::Result<Vec<u8>> {
    let bytes = tokio::fs::read(path).await?;
    if !compressed {
        return Ok(bytes);
    }
    tokio::task::spawn_blocking(move || -> std::io::Result<Vec<u8>> {
        let mut decoder = GzDecoder::new(bytes.as_slice());
        let mut out = Vec::new();
        decoder.read_to_end(&mut out)?;
        Ok(out)
    })
    .await
    .map_err(std::io::Error::other)?
}
