//! Top-level error type for the packager CLI.
//!
//! Each build step owns a focused error enum; this module folds them into
//! [`PackagerError`] so the binary can report any failure with one line and
//! a non-zero exit code.

use crate::assemble::AssemblyError;
use crate::bundle::BundleError;
use crate::fetch::FetchError;
use crate::resolver::ResolveError;
use crate::stager::StagingError;
use camino::Utf8PathBuf;
use distpack::{ConfigError, RegistryError};
use distpack_common::DescriptorError;
use thiserror::Error;

/// Errors that can occur while running a packager command.
#[derive(Debug, Error)]
pub enum PackagerError {
    /// The project configuration could not be loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The module registry could not be built.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// A descriptor or manifest was invalid.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    /// Dependency resolution failed.
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Fetching a pinned asset failed.
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Localization bundle retrieval failed.
    #[error(transparent)]
    Bundle(#[from] BundleError),

    /// Artifact assembly failed.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// Staging or launching the host instance failed.
    #[error(transparent)]
    Staging(#[from] StagingError),

    /// A module named on the command line is not registered.
    #[error("module {name} is not declared in the project configuration")]
    UnknownModule {
        /// The name as given.
        name: String,
    },

    /// `bundles` was requested but the configuration has no bundle table.
    #[error("no [bundles] table in the project configuration")]
    BundlesNotConfigured,

    /// The configured license file could not be read.
    #[error("failed to read license {path}: {source}")]
    License {
        /// Resolved license path.
        path: Utf8PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// `run` was requested but no `[[fetch]]` entry has the host role.
    #[error("no [[fetch]] entry with role = \"host\" in the project configuration")]
    HostNotConfigured,

    /// No cache directory was given and none could be derived.
    #[error("could not determine a cache directory; pass --cache-dir")]
    CacheDirUnavailable,

    /// The build was cancelled before every module was assembled.
    #[error("build cancelled")]
    Cancelled,

    /// An I/O error writing command output.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for packager commands.
pub type Result<T> = std::result::Result<T, PackagerError>;
