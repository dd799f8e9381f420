//! Cache marker stored alongside each fetched asset.
//!
//! A destination directory is a cache hit only when its marker records the
//! same URI and version key as the request and the recorded digest still
//! matches the file on disk.

use super::FetchError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// File name of the marker inside a fetch destination.
pub const MARKER_FILE_NAME: &str = ".distpack-fetch.json";

/// Persisted record of a completed fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMarker {
    /// URI the asset was fetched from.
    pub source_uri: String,
    /// Version key the asset was fetched for.
    pub version_key: String,
    /// Name of the asset file within the destination.
    pub file_name: String,
    /// Hex SHA-256 of the asset file.
    pub sha256: String,
}

impl CacheMarker {
    /// Read the marker in `destination`, if one exists and parses.
    ///
    /// An unreadable or malformed marker is treated as absent.
    #[must_use]
    pub fn read(destination: &Path) -> Option<Self> {
        let path = destination.join(MARKER_FILE_NAME);
        let bytes = fs::read(&path).ok()?;
        match serde_json::from_slice(&bytes) {
            Ok(marker) => Some(marker),
            Err(err) => {
                log::warn!("ignoring malformed cache marker {}: {err}", path.display());
                None
            }
        }
    }

    /// Write the marker into `destination`.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::CacheMarker`] if serialization fails, or
    /// [`FetchError::Io`] if the write fails.
    pub fn write(&self, destination: &Path) -> Result<(), FetchError> {
        let bytes = serde_json::to_vec_pretty(self).map_err(FetchError::CacheMarker)?;
        let path = destination.join(MARKER_FILE_NAME);
        fs::write(&path, bytes).map_err(|source| FetchError::Io { path, source })
    }

    /// Whether this marker satisfies a request and its file is intact.
    #[must_use]
    pub fn is_valid_for(&self, destination: &Path, uri: &str, version_key: &str) -> bool {
        if self.source_uri != uri || self.version_key != version_key {
            return false;
        }
        match file_sha256(&destination.join(&self.file_name)) {
            Ok(digest) => digest == self.sha256,
            Err(_) => false,
        }
    }
}

/// Compute the hex SHA-256 of a file.
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}

/// Writer adapter that hashes everything passing through it.
pub(crate) struct DigestWriter<W> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> DigestWriter<W> {
    pub(crate) fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    /// Flush the inner writer and return the hex digest.
    pub(crate) fn finish(mut self) -> io::Result<String> {
        self.inner.flush()?;
        Ok(format!("{:x}", self.hasher.finalize()))
    }
}

impl<W: Write> Write for DigestWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let written = self.inner.write(buf)?;
        self.hasher.update(buf.get(..written).unwrap_or(buf));
        Ok(written)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
