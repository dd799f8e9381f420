//! Manifest schema embedded in every assembled artifact.
//!
//! The manifest is a flat JSON object written to [`MANIFEST_PATH`] inside the
//! archive. The host reads it to learn the module's identity, entry point,
//! and runtime dependencies:
//!
//! ```json
//! {
//!   "name": "distributor-core",
//!   "displayName": "Distributor Core",
//!   "description": "Core services",
//!   "version": "4.0.0",
//!   "repo": "https://github.com/xpdustry/distributor",
//!   "author": "Xpdustry",
//!   "minGameVersion": "146",
//!   "main": "com.xpdustry.distributor.core.DistributorPlugin",
//!   "java": true,
//!   "hidden": true,
//!   "dependencies": ["distributor-api", "distributor-logging"]
//! }
//! ```
//!
//! Keys are written with the names the host loader expects. The descriptive
//! spellings (`repository`, `minimumHostVersion`, `mainEntryPoint`,
//! `isNative`, `isHidden`) are accepted when reading.

use crate::descriptor::Module;
use crate::error::{DescriptorError, Result};
use crate::module_id::ModuleId;
use serde::{Deserialize, Serialize};

/// Reserved archive path of the manifest.
pub const MANIFEST_PATH: &str = "plugin.json";

/// Author recorded when the project does not name one.
const DEFAULT_AUTHOR: &str = "unknown";

/// Build-wide metadata shared by every module's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectMetadata {
    /// Version of the enclosing build.
    pub version: Option<String>,
    /// Author credited in manifests.
    pub author: Option<String>,
    /// Source repository URL.
    pub repository: Option<String>,
    /// Oldest host build the modules support.
    pub minimum_host_version: String,
}

/// The serialized descriptor the host reads from each artifact.
///
/// # Examples
///
/// ```
/// use distpack_common::ManifestDescriptor;
///
/// let bytes = br#"{
///     "name": "core",
///     "displayName": "Core",
///     "description": "",
///     "version": "1.0.0",
///     "repo": "",
///     "author": "unknown",
///     "minGameVersion": "146",
///     "main": "com.example.Core",
///     "java": true,
///     "hidden": false,
///     "dependencies": []
/// }"#;
/// let manifest = ManifestDescriptor::deserialize(bytes).expect("valid manifest");
/// assert_eq!(manifest.name, "core");
/// let again = ManifestDescriptor::deserialize(&manifest.serialize().expect("serializes"))
///     .expect("round trip");
/// assert_eq!(again, manifest);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    /// Module identifier.
    pub name: String,
    /// Human label.
    pub display_name: String,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Resolved version string.
    pub version: String,
    /// Source repository URL, empty when unknown.
    #[serde(rename = "repo", alias = "repository", default)]
    pub repository: String,
    /// Credited author.
    #[serde(default = "default_author")]
    pub author: String,
    /// Oldest host build this module supports.
    #[serde(rename = "minGameVersion", alias = "minimumHostVersion")]
    pub minimum_host_version: String,
    /// Fully-qualified entry point.
    #[serde(rename = "main", alias = "mainEntryPoint")]
    pub main_entry_point: String,
    /// Always true for JVM plugins.
    #[serde(rename = "java", alias = "isNative", default = "default_native")]
    pub is_native: bool,
    /// Whether the host omits the module from user-facing listings.
    #[serde(rename = "hidden", alias = "isHidden", default)]
    pub is_hidden: bool,
    /// Identifiers of runtime dependencies.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_author() -> String {
    DEFAULT_AUTHOR.to_owned()
}

const fn default_native() -> bool {
    true
}

impl ManifestDescriptor {
    /// Serialize to pretty-printed JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::MalformedManifest`] if serialization fails.
    pub fn serialize(&self) -> Result<Vec<u8>> {
        let mut bytes =
            serde_json::to_vec_pretty(self).map_err(|e| DescriptorError::MalformedManifest {
                reason: e.to_string(),
            })?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    /// Parse a manifest from JSON bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::MalformedManifest`] if the bytes are not a
    /// valid manifest object.
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| DescriptorError::MalformedManifest {
            reason: e.to_string(),
        })
    }
}

/// Synthesize the manifest for `module`.
///
/// The version is the module's own override when set, otherwise the version
/// of the enclosing build from `metadata`. `dependencies` is written as-is;
/// the caller decides whether it holds the direct set or the full closure.
///
/// # Errors
///
/// Returns [`DescriptorError::MissingField`] if the module has no entry point
/// or no version can be resolved.
///
/// # Examples
///
/// ```
/// use distpack_common::{Module, ModuleId, ProjectMetadata, to_manifest};
///
/// let module = Module::builder(ModuleId::try_from("core").expect("valid identifier"))
///     .main_entry_point("com.example.Core")
///     .build()
///     .expect("valid module");
/// let metadata = ProjectMetadata {
///     version: Some("1.2.0".to_owned()),
///     author: None,
///     repository: None,
///     minimum_host_version: "146".to_owned(),
/// };
/// let manifest = to_manifest(&module, &metadata, &[]).expect("complete descriptor");
/// assert_eq!(manifest.version, "1.2.0");
/// assert_eq!(manifest.author, "unknown");
/// ```
pub fn to_manifest(
    module: &Module,
    metadata: &ProjectMetadata,
    dependencies: &[ModuleId],
) -> Result<ManifestDescriptor> {
    let missing = |field: &'static str| DescriptorError::MissingField {
        module: module.identifier().to_string(),
        field,
    };

    let main_entry_point = non_blank(module.main_entry_point()).ok_or_else(|| missing("main"))?;
    let version = non_blank(module.version())
        .or_else(|| non_blank(metadata.version.as_deref()))
        .ok_or_else(|| missing("version"))?;

    Ok(ManifestDescriptor {
        name: module.identifier().to_string(),
        display_name: module.display_name().to_owned(),
        description: module.description().to_owned(),
        version: version.to_owned(),
        repository: metadata.repository.clone().unwrap_or_default(),
        author: non_blank(metadata.author.as_deref())
            .unwrap_or(DEFAULT_AUTHOR)
            .to_owned(),
        minimum_host_version: metadata.minimum_host_version.clone(),
        main_entry_point: main_entry_point.to_owned(),
        is_native: true,
        is_hidden: module.is_hidden(),
        dependencies: dependencies.iter().map(ToString::to_string).collect(),
    })
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
