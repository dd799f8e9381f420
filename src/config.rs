//! Project configuration loaded from `distpack.toml`.
//!
//! The configuration file is the single source of truth for a build: the
//! project-wide manifest metadata, one `[[modules]]` table per plugin module,
//! the pinned `[[fetch]]` assets used by local integration runs, the bundle
//! download settings, and the runtime layout of the local host instance.
//!
//! Relative paths in the file are resolved against the directory containing
//! it, so a configuration behaves the same regardless of the working
//! directory the tool is launched from.

use camino::{Utf8Path, Utf8PathBuf};
use distpack_common::{ModuleId, ProjectMetadata};
use serde::Deserialize;
use std::fs;
use thiserror::Error;

/// Conventional configuration file name.
pub const CONFIG_FILE_NAME: &str = "distpack.toml";

/// Errors raised while loading the project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// Path of the configuration file.
        path: Utf8PathBuf,
        /// Underlying I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid TOML or violates the schema.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// More than one `[[fetch]]` entry has `role = "host"`.
    #[error("fetch entries {first} and {second} both have role = \"host\"")]
    DuplicateHostAsset {
        /// Name of the first host entry.
        first: String,
        /// Name of the second host entry.
        second: String,
    },
}

/// Which dependency set a manifest's `dependencies` field carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestDependencies {
    /// Declared dependencies plus the synthetic logging module.
    #[default]
    Direct,
    /// The full resolved closure.
    Closure,
}

/// Top-level `distpack.toml` document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Project-wide settings.
    pub project: ProjectSection,
    /// Plugin modules built together.
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
    /// Pinned remote assets.
    #[serde(default)]
    pub fetch: Vec<FetchConfig>,
    /// Localization bundle download settings.
    #[serde(default)]
    pub bundles: Option<BundleConfig>,
    /// Local host instance layout.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(skip)]
    root: Utf8PathBuf,
}

/// The `[project]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectSection {
    /// Version stamped into every manifest unless a module overrides it.
    #[serde(default)]
    pub version: Option<String>,
    /// Author credited in manifests.
    #[serde(default)]
    pub author: Option<String>,
    /// Source repository URL.
    #[serde(default)]
    pub repository: Option<String>,
    /// Oldest host build the modules support.
    pub minimum_host_version: String,
    /// License file injected into every artifact.
    #[serde(default)]
    pub license: Option<Utf8PathBuf>,
    /// Module every other module depends on implicitly.
    #[serde(default)]
    pub logging_module: Option<ModuleId>,
    /// Package prefix for module-private relocation targets.
    #[serde(default = "ProjectSection::default_relocation_prefix")]
    pub relocation_prefix: String,
    /// Dependency set written into manifests.
    #[serde(default)]
    pub manifest_dependencies: ManifestDependencies,
    /// Directory assembled artifacts are written to.
    #[serde(default = "ProjectSection::default_output_dir")]
    pub output_dir: Utf8PathBuf,
}

impl ProjectSection {
    fn default_relocation_prefix() -> String {
        "distpack.shadow".to_owned()
    }

    fn default_output_dir() -> Utf8PathBuf {
        Utf8PathBuf::from("build/distpack")
    }
}

/// One `[[modules]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleConfig {
    /// Unique identifier.
    pub identifier: ModuleId,
    /// Human label.
    #[serde(default)]
    pub display_name: String,
    /// Fully-qualified entry point.
    #[serde(default)]
    pub main: Option<String>,
    /// Human description.
    #[serde(default)]
    pub description: String,
    /// Version override.
    #[serde(default)]
    pub version: Option<String>,
    /// Hide from host listings.
    #[serde(default)]
    pub hidden: bool,
    /// Root package of the module's own code.
    #[serde(default)]
    pub source_package: Option<String>,
    /// Declared runtime dependencies.
    #[serde(default)]
    pub dependencies: Vec<ModuleId>,
    /// Compiled classes directory or jar.
    #[serde(default)]
    pub compiled_output: Option<Utf8PathBuf>,
    /// Third-party archives bundled into the artifact.
    #[serde(default)]
    pub libraries: Vec<LibrarySpec>,
    /// Package roots relocated into a module-private namespace.
    #[serde(default)]
    pub relocate: Vec<RelocationSpec>,
    /// Strip library classes unreachable from the module's own code.
    #[serde(default)]
    pub minimize: bool,
    /// Coordinate patterns exempt from minimization.
    #[serde(default)]
    pub minimize_keep: Vec<String>,
}

/// A bundled third-party archive.
///
/// Either a bare path or a table carrying the library coordinate, which
/// minimization whitelists match against.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum LibrarySpec {
    /// A path; the coordinate defaults to the file stem.
    Path(Utf8PathBuf),
    /// A path with an explicit coordinate.
    Detailed {
        /// Archive location.
        path: Utf8PathBuf,
        /// `group:artifact:version` style coordinate.
        coordinate: String,
    },
}

impl LibrarySpec {
    /// Archive location as written in the configuration.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        match self {
            Self::Path(path) | Self::Detailed { path, .. } => path,
        }
    }

    /// Coordinate used for whitelist matching.
    #[must_use]
    pub fn coordinate(&self) -> String {
        match self {
            Self::Path(path) => path.file_stem().unwrap_or(path.as_str()).to_owned(),
            Self::Detailed { coordinate, .. } => coordinate.clone(),
        }
    }
}

/// A relocation rule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RelocationSpec {
    /// Relocate to the module's derived private namespace.
    Root(String),
    /// Relocate to an explicit target root.
    Explicit {
        /// Original package root.
        from: String,
        /// Target package root.
        to: String,
    },
}

/// Role of a fetched asset in the local runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetRole {
    /// The host process jar.
    Host,
    /// A companion copied into the plugin directory.
    #[default]
    Plugin,
}

/// One `[[fetch]]` entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FetchConfig {
    /// Cache directory name.
    pub name: String,
    /// URI template; `{version}` is substituted.
    pub url: String,
    /// Pinned version, also the cache key.
    pub version: String,
    /// Runtime role.
    #[serde(default)]
    pub role: AssetRole,
    /// Local file name, defaulting to the last URI segment.
    #[serde(default)]
    pub file_name: Option<String>,
}

impl FetchConfig {
    /// Expand the URI template with the pinned version.
    ///
    /// # Examples
    ///
    /// ```
    /// use distpack::config::{AssetRole, FetchConfig};
    ///
    /// let fetch = FetchConfig {
    ///     name: "server".to_owned(),
    ///     url: "https://example.test/v{version}/server.jar".to_owned(),
    ///     version: "146".to_owned(),
    ///     role: AssetRole::Host,
    ///     file_name: None,
    /// };
    /// assert_eq!(fetch.resolved_url(), "https://example.test/v146/server.jar");
    /// ```
    #[must_use]
    pub fn resolved_url(&self) -> String {
        self.url.replace("{version}", &self.version)
    }
}

/// The `[bundles]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BundleConfig {
    /// Source archive tag.
    pub version: String,
    /// Regex selecting bundle entries inside the archive.
    #[serde(default = "BundleConfig::default_path_pattern")]
    pub path_pattern: String,
    /// Output directory for rewritten bundles.
    #[serde(default = "BundleConfig::default_output_dir")]
    pub output_dir: Utf8PathBuf,
}

impl BundleConfig {
    fn default_path_pattern() -> String {
        "/core/assets/bundles/".to_owned()
    }

    fn default_output_dir() -> Utf8PathBuf {
        Utf8PathBuf::from("build/bundles")
    }
}

/// The `[runtime]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Host instance working directory.
    pub instance_dir: Utf8PathBuf,
    /// Plugin directory relative to the instance directory.
    pub plugin_dir: Utf8PathBuf,
    /// Java executable.
    pub java: String,
    /// Extra arguments passed to the host after `-jar <host>`.
    pub host_args: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            instance_dir: Utf8PathBuf::from("build/server"),
            plugin_dir: Utf8PathBuf::from("config/mods"),
            java: "java".to_owned(),
            host_args: Vec::new(),
        }
    }
}

impl ProjectConfig {
    /// Parse configuration text. Relative paths resolve against `root`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] on malformed TOML, unknown fields, or
    /// invalid module identifiers, and [`ConfigError::DuplicateHostAsset`]
    /// if two fetch entries claim the host role.
    pub fn from_toml_str(source: &str, root: &Utf8Path) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(source)?;
        config.root = root.to_owned();
        config.host_asset()?;
        log::debug!(
            "parsed configuration with {} module(s) and {} pinned asset(s)",
            config.modules.len(),
            config.fetch.len()
        );
        Ok(config)
    }

    /// The single `[[fetch]]` entry with the host role, if any.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateHostAsset`] naming the first two host
    /// entries when more than one is configured.
    pub fn host_asset(&self) -> Result<Option<&FetchConfig>, ConfigError> {
        let mut hosts = self.fetch.iter().filter(|entry| entry.role == AssetRole::Host);
        let first = hosts.next();
        match (first, hosts.next()) {
            (Some(first), Some(second)) => Err(ConfigError::DuplicateHostAsset {
                first: first.name.clone(),
                second: second.name.clone(),
            }),
            (first, _) => Ok(first),
        }
    }

    /// Read and parse the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read, or
    /// [`ConfigError::Parse`] if it is invalid.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let root = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or_else(|| Utf8Path::new("."));
        Self::from_toml_str(&source, root)
    }

    /// Directory relative paths are resolved against.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Resolve a configured path against the configuration root.
    #[must_use]
    pub fn resolve_path(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_owned()
        } else {
            self.root.join(path)
        }
    }

    /// Project-wide manifest metadata.
    #[must_use]
    pub fn metadata(&self) -> ProjectMetadata {
        ProjectMetadata {
            version: self.project.version.clone(),
            author: self.project.author.clone(),
            repository: self.project.repository.clone(),
            minimum_host_version: self.project.minimum_host_version.clone(),
        }
    }
}
