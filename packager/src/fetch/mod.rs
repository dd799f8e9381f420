//! Cached retrieval of pinned remote assets.
//!
//! Each asset is fetched into its own destination directory. A completed
//! fetch leaves the asset file and a [`cache::CacheMarker`]; repeating the
//! fetch with the same URI and version key reuses the directory without
//! touching the network. Downloads are staged in a sibling temporary
//! directory and renamed into place, so an interrupted or failed fetch never
//! leaves a partial destination behind.

pub mod cache;
pub mod download;

use cache::{CacheMarker, DigestWriter, MARKER_FILE_NAME};
use download::RemoteSource;
use serde::Serialize;
use std::fs;
use std::io::{self, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name used when the URI has no usable last segment.
const FALLBACK_FILE_NAME: &str = "asset";

/// Errors arising from fetch operations.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The request failed or returned a non-success status.
    #[error("remote fetch of {uri} failed: {reason}")]
    RemoteFetch {
        /// The requested URI.
        uri: String,
        /// Final HTTP status, when one was received.
        status: Option<u16>,
        /// Description of the failure.
        reason: String,
    },

    /// The URI scheme is not HTTP or HTTPS.
    #[error("unsupported URI scheme: {uri}")]
    UnsupportedUri {
        /// The rejected URI.
        uri: String,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The cache marker could not be serialized.
    #[error("failed to write cache marker: {0}")]
    CacheMarker(#[source] serde_json::Error),

    /// A parallel fetch worker panicked.
    #[error("fetch worker panicked")]
    WorkerPanicked,
}

impl FetchError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One asset to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Remote URI.
    pub uri: String,
    /// Key identifying the pinned version; a change forces a refetch.
    pub version_key: String,
    /// Directory that will hold the asset.
    pub destination: PathBuf,
    /// File name inside the destination; derived from the URI when absent.
    pub file_name: Option<String>,
}

impl FetchRequest {
    /// Create a request whose file name is derived from the URI.
    #[must_use]
    pub fn new(
        uri: impl Into<String>,
        version_key: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            uri: uri.into(),
            version_key: version_key.into(),
            destination: destination.into(),
            file_name: None,
        }
    }

    /// The asset file name within the destination.
    #[must_use]
    pub fn resolved_file_name(&self) -> String {
        if let Some(name) = self.file_name.as_deref() {
            return name.to_owned();
        }
        let path = self.uri.split(['?', '#']).next().unwrap_or_default();
        path.rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .map_or_else(|| FALLBACK_FILE_NAME.to_owned(), ToOwned::to_owned)
    }
}

/// An asset present on local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchedAsset {
    /// URI the asset came from.
    pub source_uri: String,
    /// Version key it was fetched for.
    pub version_key: String,
    /// Path of the asset file.
    pub local_path: PathBuf,
    /// Files within the destination directory, excluding the cache marker.
    pub contents_manifest: Vec<String>,
    /// Hex SHA-256 of the asset file.
    pub sha256: String,
}

/// Retrieve one asset, reusing a valid cached copy.
///
/// # Errors
///
/// Returns [`FetchError::UnsupportedUri`] for non-HTTP(S) URIs,
/// [`FetchError::RemoteFetch`] when the download fails (the destination is
/// then absent), or [`FetchError::Io`] on filesystem failures.
pub fn fetch(
    source: &dyn RemoteSource,
    request: &FetchRequest,
) -> Result<FetchedAsset, FetchError> {
    validate_scheme(&request.uri)?;
    let destination = request.destination.as_path();

    if let Some(marker) = CacheMarker::read(destination) {
        if marker.is_valid_for(destination, &request.uri, &request.version_key) {
            log::debug!("cache hit for {} at {}", request.uri, destination.display());
            return asset_from_marker(destination, marker);
        }
        log::info!("cache for {} is stale; refetching", request.uri);
    }

    if destination.exists() {
        fs::remove_dir_all(destination).map_err(FetchError::io(destination))?;
    }
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(FetchError::io(parent))?;

    let staging = tempfile::Builder::new()
        .prefix(".distpack-fetch-")
        .tempdir_in(parent)
        .map_err(FetchError::io(parent))?;

    let file_name = request.resolved_file_name();
    let staged_file = staging.path().join(&file_name);
    let sha256 = download_into(source, &request.uri, &staged_file)?;
    let marker = CacheMarker {
        source_uri: request.uri.clone(),
        version_key: request.version_key.clone(),
        file_name,
        sha256,
    };
    marker.write(staging.path())?;

    fs::rename(staging.path(), destination).map_err(FetchError::io(destination))?;
    log::info!("fetched {} into {}", request.uri, destination.display());
    asset_from_marker(destination, marker)
}

/// Retrieve several assets in parallel.
///
/// Results are returned in request order. The first failure is reported;
/// fetches already in flight still run to completion.
///
/// # Errors
///
/// Returns the first [`FetchError`] in request order.
pub fn fetch_all(
    source: &(dyn RemoteSource + Sync),
    requests: &[FetchRequest],
) -> Result<Vec<FetchedAsset>, FetchError> {
    std::thread::scope(|scope| {
        let handles: Vec<_> = requests
            .iter()
            .map(|request| scope.spawn(move || fetch(source, request)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap_or(Err(FetchError::WorkerPanicked)))
            .collect()
    })
}

fn validate_scheme(uri: &str) -> Result<(), FetchError> {
    let lower = uri.to_ascii_lowercase();
    if lower.starts_with("https://") || lower.starts_with("http://") {
        Ok(())
    } else {
        Err(FetchError::UnsupportedUri {
            uri: uri.to_owned(),
        })
    }
}

fn download_into(
    source: &dyn RemoteSource,
    uri: &str,
    target: &Path,
) -> Result<String, FetchError> {
    let mut reader = source.open(uri)?;
    let file = fs::File::create(target).map_err(FetchError::io(target))?;
    let mut writer = DigestWriter::new(BufWriter::new(file));
    io::copy(&mut reader, &mut writer).map_err(|e| FetchError::RemoteFetch {
        uri: uri.to_owned(),
        status: None,
        reason: format!("body transfer failed: {e}"),
    })?;
    writer.finish().map_err(FetchError::io(target))
}

fn asset_from_marker(
    destination: &Path,
    marker: CacheMarker,
) -> Result<FetchedAsset, FetchError> {
    let mut contents_manifest = Vec::new();
    for entry in fs::read_dir(destination).map_err(FetchError::io(destination))? {
        let entry = entry.map_err(FetchError::io(destination))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name != MARKER_FILE_NAME {
            contents_manifest.push(name);
        }
    }
    contents_manifest.sort();

    Ok(FetchedAsset {
        local_path: destination.join(&marker.file_name),
        source_uri: marker.source_uri,
        version_key: marker.version_key,
        contents_manifest,
        sha256: marker.sha256,
    })
}

#[cfg(test)]
#[path = "fetch_tests.rs"]
mod tests;
