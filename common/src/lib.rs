//! Module descriptor model shared by the distpack crates.
//!
//! A [`Module`] captures the identity of one plugin unit together with the
//! other modules it needs at runtime. [`to_manifest`] turns a module into the
//! [`ManifestDescriptor`] that is embedded as `plugin.json` inside each
//! assembled artifact.
//!
//! # Modules
//!
//! - [`descriptor`] - The [`Module`] type and its builder
//! - [`error`] - Validation and manifest synthesis errors
//! - [`manifest`] - Manifest schema, serialization, and synthesis
//! - [`module_id`] - Validated module identifier newtype

pub mod descriptor;
pub mod error;
pub mod manifest;
pub mod module_id;

pub use descriptor::{Module, ModuleBuilder};
pub use error::{DescriptorError, Result};
pub use manifest::{MANIFEST_PATH, ManifestDescriptor, ProjectMetadata, to_manifest};
pub use module_id::ModuleId;
