//! distpack packager library.
//!
//! This crate turns the modules declared in `distpack.toml` into
//! distributable archives and prepares a local host instance to run them.
//! It backs the `distpack` CLI binary and can be driven programmatically.
//!
//! # Modules
//!
//! - [`assemble`] - Archive assembly, relocation, minimization and service merging
//! - [`bundle`] - Localization bundle download and rewriting
//! - [`cli`] - Command-line argument definitions
//! - [`dirs`] - Platform directory lookup for the fetch cache
//! - [`error`] - Aggregated error type for packager commands
//! - [`fetch`] - Cached, parallel retrieval of pinned remote assets
//! - [`output`] - Progress and result formatting
//! - [`pipeline`] - Two-phase build planning and parallel assembly
//! - [`resolver`] - Dependency closure resolution
//! - [`stager`] - Host instance staging and launch

pub mod assemble;
pub mod bundle;
pub mod cli;
pub mod dirs;
pub mod error;
pub mod fetch;
pub mod output;
pub mod pipeline;
pub mod resolver;
pub mod stager;

#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
