//! Retrieval of the host's localization bundles.
//!
//! Plugins reuse the host's translated content names. For a given host
//! version the source snapshot is streamed from the upstream repository, the
//! bundle files are extracted, each file is reduced to content display-name
//! keys under the `mindustry.` prefix, and the default bundle is renamed to
//! its explicit English locale.

pub mod extraction;
pub mod properties;

use crate::fetch::FetchError;
use crate::fetch::download::RemoteSource;
use properties::PropertyList;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source snapshot URL template; `{version}` is the host release tag.
pub const SNAPSHOT_URL_TEMPLATE: &str =
    "https://github.com/Anuken/Mindustry/archive/refs/tags/{version}.zip";

/// Base name of the default bundle as shipped by the host.
pub const DEFAULT_BUNDLE: &str = "bundle.properties";

/// Base name the default bundle is renamed to.
pub const ENGLISH_BUNDLE: &str = "bundle_en.properties";

/// Errors arising from bundle retrieval.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The snapshot could not be downloaded.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// The snapshot is not a readable zip archive.
    #[error("source archive is corrupt: {reason}")]
    ArchiveIntegrity {
        /// Description of the failure.
        reason: String,
    },

    /// The configured path pattern is not a valid expression.
    #[error("invalid bundle path pattern {pattern}: {source}")]
    InvalidPattern {
        /// The rejected pattern.
        pattern: String,
        /// Underlying error.
        source: regex::Error,
    },

    /// No default bundle was extracted.
    #[error("no {DEFAULT_BUNDLE} among the extracted bundles")]
    MissingDefaultBundle,

    /// A filesystem operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },
}

impl BundleError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// The localized bundle files written for one host version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSet {
    /// Directory holding the bundles.
    pub directory: PathBuf,
    /// Bundle files, sorted.
    pub files: BTreeSet<PathBuf>,
}

/// Build the snapshot URL for a host version.
///
/// # Examples
///
/// ```
/// use distpack_packager::bundle::snapshot_url;
///
/// assert_eq!(
///     snapshot_url("v146"),
///     "https://github.com/Anuken/Mindustry/archive/refs/tags/v146.zip"
/// );
/// ```
#[must_use]
pub fn snapshot_url(version: &str) -> String {
    SNAPSHOT_URL_TEMPLATE.replace("{version}", version)
}

/// Download, extract and localize the bundles for `version`.
///
/// The bundles are prepared in a temporary sibling of `destination` and
/// moved into place only once every step succeeded; any previous contents of
/// `destination` are replaced.
///
/// # Errors
///
/// Returns [`BundleError::Fetch`] if the snapshot cannot be downloaded,
/// [`BundleError::ArchiveIntegrity`] on a corrupt archive,
/// [`BundleError::MissingDefaultBundle`] if no default bundle matched, or
/// [`BundleError::Io`] on filesystem failures.
pub fn download_bundles(
    source: &dyn RemoteSource,
    version: &str,
    path_pattern: &str,
    destination: &Path,
) -> Result<BundleSet, BundleError> {
    let pattern = Regex::new(path_pattern).map_err(|source| BundleError::InvalidPattern {
        pattern: path_pattern.to_owned(),
        source,
    })?;
    let parent = destination.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent).map_err(BundleError::io(parent))?;
    let staging = tempfile::Builder::new()
        .prefix(".distpack-bundles-")
        .tempdir_in(parent)
        .map_err(BundleError::io(parent))?;

    let url = snapshot_url(version);
    log::info!("downloading localization bundles from {url}");
    let archive = source.open(&url)?;
    let extracted = extraction::extract_filtered(archive, &pattern, staging.path())?;
    let localized = localize(staging.path(), &extracted)?;

    if destination.exists() {
        fs::remove_dir_all(destination).map_err(BundleError::io(destination))?;
    }
    fs::rename(staging.path(), destination).map_err(BundleError::io(destination))?;

    let files = localized
        .iter()
        .filter_map(|path| path.file_name())
        .map(|name| destination.join(name))
        .collect();
    log::info!("wrote {} bundle file(s) to {}", localized.len(), destination.display());
    Ok(BundleSet {
        directory: destination.to_path_buf(),
        files,
    })
}

/// Rewrite extracted bundles in place and rename the default bundle.
///
/// Every `.properties` file is reduced to content display-name keys. The
/// returned set reflects the final file names.
///
/// # Errors
///
/// Returns [`BundleError::MissingDefaultBundle`] if `files` holds no default
/// bundle, or [`BundleError::Io`] on filesystem failures.
pub fn localize(
    directory: &Path,
    files: &BTreeSet<PathBuf>,
) -> Result<BTreeSet<PathBuf>, BundleError> {
    let default_bundle = directory.join(DEFAULT_BUNDLE);
    if !files.contains(&default_bundle) {
        return Err(BundleError::MissingDefaultBundle);
    }

    let mut localized = BTreeSet::new();
    for path in files {
        if path.extension().is_some_and(|ext| ext == "properties") {
            rewrite_file(path)?;
        }
        localized.insert(path.clone());
    }

    let english = directory.join(ENGLISH_BUNDLE);
    fs::rename(&default_bundle, &english).map_err(BundleError::io(&default_bundle))?;
    localized.remove(&default_bundle);
    localized.insert(english);
    Ok(localized)
}

fn rewrite_file(path: &Path) -> Result<(), BundleError> {
    let bytes = fs::read(path).map_err(BundleError::io(path))?;
    let text = String::from_utf8_lossy(&bytes);
    let rewritten = PropertyList::parse(&text).content_names();
    fs::write(path, rewritten.render()).map_err(BundleError::io(path))
}
