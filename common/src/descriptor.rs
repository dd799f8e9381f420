//! Module descriptors.
//!
//! A [`Module`] is the in-memory identity of one plugin unit: its identifier,
//! human-facing labels, the entry point the host resolves at load time, and
//! the other modules it declares as runtime dependencies. Modules are built
//! through [`ModuleBuilder`], which enforces the ordered-set invariant on
//! declared dependencies.

use crate::error::{DescriptorError, Result};
use crate::module_id::ModuleId;

/// Identity and declared runtime dependencies of one plugin module.
///
/// # Examples
///
/// ```
/// use distpack_common::{Module, ModuleId};
///
/// let core = ModuleId::try_from("core").expect("valid identifier");
/// let module = Module::builder(ModuleId::try_from("commands").expect("valid identifier"))
///     .display_name("Commands")
///     .main_entry_point("com.example.commands.CommandsPlugin")
///     .depends_on(core.clone())
///     .build()
///     .expect("valid module");
///
/// assert_eq!(module.declared_dependencies(), &[core]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    identifier: ModuleId,
    display_name: String,
    main_entry_point: Option<String>,
    description: String,
    version: Option<String>,
    declared_dependencies: Vec<ModuleId>,
    hidden: bool,
    source_package: Option<String>,
}

impl Module {
    /// Start building a module with the given identifier.
    #[must_use]
    pub fn builder(identifier: ModuleId) -> ModuleBuilder {
        ModuleBuilder::new(identifier)
    }

    /// The unique module identifier.
    #[must_use]
    pub fn identifier(&self) -> &ModuleId {
        &self.identifier
    }

    /// The human-readable label. Falls back to the identifier when unset.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if self.display_name.is_empty() {
            self.identifier.as_str()
        } else {
            &self.display_name
        }
    }

    /// Fully-qualified entry point resolved by the host at load time.
    #[must_use]
    pub fn main_entry_point(&self) -> Option<&str> {
        self.main_entry_point.as_deref()
    }

    /// Human description.
    #[must_use]
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Module-specific version override, if any.
    ///
    /// Most modules inherit the version of the enclosing build, which is
    /// supplied when the manifest is synthesized.
    #[must_use]
    pub fn version(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Declared runtime dependencies in declaration order.
    #[must_use]
    pub fn declared_dependencies(&self) -> &[ModuleId] {
        &self.declared_dependencies
    }

    /// Whether the host should hide this module from user-facing listings.
    #[must_use]
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Root package of the module's own compiled code, if known.
    #[must_use]
    pub fn source_package(&self) -> Option<&str> {
        self.source_package.as_deref()
    }
}

/// Builder for [`Module`].
///
/// Dependencies are kept in declaration order. [`ModuleBuilder::build`]
/// rejects self-references and repeated dependencies rather than silently
/// deduplicating them, since either usually signals a configuration typo.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    module: Module,
}

impl ModuleBuilder {
    fn new(identifier: ModuleId) -> Self {
        Self {
            module: Module {
                identifier,
                display_name: String::new(),
                main_entry_point: None,
                description: String::new(),
                version: None,
                declared_dependencies: Vec::new(),
                hidden: false,
                source_package: None,
            },
        }
    }

    /// Set the display name.
    #[must_use]
    pub fn display_name(mut self, value: impl Into<String>) -> Self {
        self.module.display_name = value.into();
        self
    }

    /// Set the entry point reference.
    #[must_use]
    pub fn main_entry_point(mut self, value: impl Into<String>) -> Self {
        self.module.main_entry_point = Some(value.into());
        self
    }

    /// Set the description.
    #[must_use]
    pub fn description(mut self, value: impl Into<String>) -> Self {
        self.module.description = value.into();
        self
    }

    /// Override the version inherited from the enclosing build.
    #[must_use]
    pub fn version(mut self, value: impl Into<String>) -> Self {
        self.module.version = Some(value.into());
        self
    }

    /// Append a declared runtime dependency.
    #[must_use]
    pub fn depends_on(mut self, dependency: ModuleId) -> Self {
        self.module.declared_dependencies.push(dependency);
        self
    }

    /// Append several declared runtime dependencies.
    #[must_use]
    pub fn depends_on_all(mut self, dependencies: impl IntoIterator<Item = ModuleId>) -> Self {
        self.module.declared_dependencies.extend(dependencies);
        self
    }

    /// Mark the module as hidden from host listings.
    #[must_use]
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.module.hidden = hidden;
        self
    }

    /// Set the root package of the module's own code.
    #[must_use]
    pub fn source_package(mut self, value: impl Into<String>) -> Self {
        self.module.source_package = Some(value.into());
        self
    }

    /// Validate and produce the module.
    ///
    /// # Errors
    ///
    /// Returns [`DescriptorError::SelfDependency`] if the module lists itself,
    /// or [`DescriptorError::DuplicateDependency`] if a dependency is listed
    /// twice.
    pub fn build(self) -> Result<Module> {
        let module = self.module;
        for (index, dependency) in module.declared_dependencies.iter().enumerate() {
            if *dependency == module.identifier {
                return Err(DescriptorError::SelfDependency {
                    module: module.identifier.to_string(),
                });
            }
            if module
                .declared_dependencies
                .iter()
                .take(index)
                .any(|earlier| earlier == dependency)
            {
                return Err(DescriptorError::DuplicateDependency {
                    module: module.identifier.to_string(),
                    dependency: dependency.to_string(),
                });
            }
        }
        Ok(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn id(value: &str) -> ModuleId {
        ModuleId::try_from(value).expect("valid identifier")
    }

    #[fixture]
    fn commands() -> ModuleBuilder {
        Module::builder(id("commands"))
            .display_name("Commands")
            .main_entry_point("com.example.commands.CommandsPlugin")
    }

    #[rstest]
    fn preserves_declaration_order(commands: ModuleBuilder) {
        let module = commands
            .depends_on(id("permissions"))
            .depends_on(id("core"))
            .build()
            .expect("valid module");
        assert_eq!(
            module.declared_dependencies(),
            &[id("permissions"), id("core")]
        );
    }

    #[rstest]
    fn rejects_self_dependency(commands: ModuleBuilder) {
        let result = commands.depends_on(id("commands")).build();
        assert!(matches!(result, Err(DescriptorError::SelfDependency { .. })));
    }

    #[rstest]
    fn rejects_duplicate_dependency(commands: ModuleBuilder) {
        let result = commands
            .depends_on_all([id("core"), id("permissions"), id("core")])
            .build();
        assert!(matches!(
            result,
            Err(DescriptorError::DuplicateDependency { ref dependency, .. }) if dependency == "core"
        ));
    }

    #[test]
    fn display_name_falls_back_to_identifier() {
        let module = Module::builder(id("core")).build().expect("valid module");
        assert_eq!(module.display_name(), "core");
    }
}
