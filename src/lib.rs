//! Project configuration and module registry for distpack.
//!
//! `distpack.toml` describes the plugin modules built together, the pinned
//! assets fetched for local runs, and the host instance layout. This crate
//! parses that file into [`ProjectConfig`] and turns its module tables into a
//! typed [`ModuleRegistry`] that the packager passes explicitly to every
//! build step.

pub mod config;
pub mod registry;

pub use config::{CONFIG_FILE_NAME, ConfigError, ManifestDependencies, ProjectConfig};
pub use registry::{Library, ModuleBuild, ModuleRegistry, RegisteredModule, RegistryError};
