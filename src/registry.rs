//! Typed registry of the modules built together.
//!
//! The registry is constructed once from the project configuration and then
//! passed by reference to the resolver and the assembler. Lookups are keyed
//! by [`ModuleId`]; there is no name-based discovery at build time.

use crate::config::{LibrarySpec, ModuleConfig, ProjectConfig, RelocationSpec};
use camino::Utf8PathBuf;
use distpack_common::{DescriptorError, Module, ModuleId};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while building the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Two modules share an identifier.
    #[error("module identifier {identifier} is declared more than once")]
    DuplicateModule {
        /// The repeated identifier.
        identifier: ModuleId,
    },

    /// The configured logging module is not among the registered modules.
    #[error("logging module {identifier} is not a registered module")]
    UnknownLoggingModule {
        /// The configured identifier.
        identifier: ModuleId,
    },

    /// A module descriptor is invalid.
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
}

/// A third-party archive bundled into a module's artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Library {
    /// Resolved archive path.
    pub path: Utf8PathBuf,
    /// Coordinate matched by minimization whitelists.
    pub coordinate: String,
}

/// Assembly inputs of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleBuild {
    /// Compiled classes directory or jar.
    pub compiled_output: Option<Utf8PathBuf>,
    /// Bundled third-party archives.
    pub libraries: Vec<Library>,
    /// Relocation rules.
    pub relocations: Vec<RelocationSpec>,
    /// Whether unreachable library classes are stripped.
    pub minimize: bool,
    /// Coordinate patterns exempt from minimization.
    pub minimize_keep: Vec<String>,
}

/// A module descriptor together with its assembly inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredModule {
    /// Identity and declared dependencies.
    pub descriptor: Module,
    /// Assembly inputs.
    pub build: ModuleBuild,
}

/// Registry of modules keyed by identifier, in registration order.
///
/// # Examples
///
/// ```
/// use distpack::registry::{ModuleBuild, ModuleRegistry};
/// use distpack_common::{Module, ModuleId};
///
/// let core = ModuleId::try_from("core").expect("valid identifier");
/// let mut registry = ModuleRegistry::new(None);
/// registry
///     .register(Module::builder(core.clone()).build().expect("valid module"), ModuleBuild::default())
///     .expect("unique identifier");
/// assert!(registry.get(&core).is_some());
/// ```
#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    modules: Vec<RegisteredModule>,
    index: HashMap<ModuleId, usize>,
    logging_module: Option<ModuleId>,
}

impl ModuleRegistry {
    /// Create an empty registry with an optional synthetic logging module.
    #[must_use]
    pub fn new(logging_module: Option<ModuleId>) -> Self {
        Self {
            modules: Vec::new(),
            index: HashMap::new(),
            logging_module,
        }
    }

    /// Build the registry from the project configuration.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateModule`] on repeated identifiers,
    /// [`RegistryError::Descriptor`] on invalid dependency lists, or
    /// [`RegistryError::UnknownLoggingModule`] if the logging module is not
    /// configured.
    pub fn from_config(config: &ProjectConfig) -> Result<Self, RegistryError> {
        let mut registry = Self::new(config.project.logging_module.clone());
        for entry in &config.modules {
            let descriptor = descriptor_from_config(entry)?;
            registry.register(descriptor, build_from_config(config, entry))?;
        }

        if let Some(logging) = registry.logging_module.as_ref() {
            if !registry.contains(logging) {
                return Err(RegistryError::UnknownLoggingModule {
                    identifier: logging.clone(),
                });
            }
        }

        log::debug!("registered {} module(s)", registry.len());
        Ok(registry)
    }

    /// Add a module.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateModule`] if the identifier is taken.
    pub fn register(&mut self, descriptor: Module, build: ModuleBuild) -> Result<(), RegistryError> {
        let identifier = descriptor.identifier().clone();
        if self.index.contains_key(&identifier) {
            return Err(RegistryError::DuplicateModule { identifier });
        }
        self.index.insert(identifier, self.modules.len());
        self.modules.push(RegisteredModule { descriptor, build });
        Ok(())
    }

    /// Look up a module.
    #[must_use]
    pub fn get(&self, identifier: &ModuleId) -> Option<&RegisteredModule> {
        self.index
            .get(identifier)
            .and_then(|&position| self.modules.get(position))
    }

    /// Whether a module is registered.
    #[must_use]
    pub fn contains(&self, identifier: &ModuleId) -> bool {
        self.index.contains_key(identifier)
    }

    /// The synthetic logging module, if configured.
    #[must_use]
    pub const fn logging_module(&self) -> Option<&ModuleId> {
        self.logging_module.as_ref()
    }

    /// Registered modules in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisteredModule> {
        self.modules.iter()
    }

    /// Registered identifiers in registration order.
    pub fn identifiers(&self) -> impl Iterator<Item = &ModuleId> {
        self.modules.iter().map(|m| m.descriptor.identifier())
    }

    /// Number of registered modules.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.modules.len()
    }

    /// Whether no modules are registered.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

fn descriptor_from_config(entry: &ModuleConfig) -> Result<Module, DescriptorError> {
    let mut builder = Module::builder(entry.identifier.clone())
        .display_name(entry.display_name.as_str())
        .description(entry.description.as_str())
        .hidden(entry.hidden)
        .depends_on_all(entry.dependencies.iter().cloned());
    if let Some(main) = entry.main.as_deref() {
        builder = builder.main_entry_point(main);
    }
    if let Some(version) = entry.version.as_deref() {
        builder = builder.version(version);
    }
    if let Some(package) = entry.source_package.as_deref() {
        builder = builder.source_package(package);
    }
    builder.build()
}

fn build_from_config(config: &ProjectConfig, entry: &ModuleConfig) -> ModuleBuild {
    ModuleBuild {
        compiled_output: entry
            .compiled_output
            .as_deref()
            .map(|path| config.resolve_path(path)),
        libraries: entry
            .libraries
            .iter()
            .map(|library: &LibrarySpec| Library {
                path: config.resolve_path(library.path()),
                coordinate: library.coordinate(),
            })
            .collect(),
        relocations: entry.relocate.clone(),
        minimize: entry.minimize,
        minimize_keep: entry.minimize_keep.clone(),
    }
}
