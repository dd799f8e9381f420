//! Dependency closure resolution.
//!
//! A module's closure is every module reachable through declared
//! dependencies, plus the synthetic logging module when the registry names
//! one. Resolution walks the graph depth first; a module met again while it
//! is still on the walk path is a cycle and aborts resolution with the path
//! that closes it.
//!
//! The logging module is injected into every closure except its own and
//! those of modules it depends on, since injecting it there would create the
//! very cycle resolution rejects.

use distpack::{ManifestDependencies, ModuleRegistry};
use distpack_common::ModuleId;
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// A dependency edge leads back onto the current walk path.
    #[error("cyclic dependency while resolving {module}: {}", format_cycle(.cycle))]
    CyclicDependency {
        /// The module being resolved.
        module: ModuleId,
        /// The cycle, starting and ending with the same module.
        cycle: Vec<ModuleId>,
    },

    /// A referenced module is not registered.
    #[error("unknown module {module}{}", format_referrer(.referenced_by.as_ref()))]
    UnknownModule {
        /// The missing identifier.
        module: ModuleId,
        /// The module declaring the reference, if any.
        referenced_by: Option<ModuleId>,
    },
}

fn format_cycle(cycle: &[ModuleId]) -> String {
    cycle
        .iter()
        .map(ModuleId::as_str)
        .collect::<Vec<_>>()
        .join(" -> ")
}

fn format_referrer(referrer: Option<&ModuleId>) -> String {
    referrer.map_or_else(String::new, |r| format!(" (referenced by {r})"))
}

/// How a module entered a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyOrigin {
    /// Declared directly by the resolved module.
    Declared,
    /// Reached through another member.
    Transitive,
    /// Injected as the synthetic logging module.
    Synthetic,
}

/// One member of a closure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureMember {
    /// Member identifier.
    pub id: ModuleId,
    /// How it was reached.
    pub origin: DependencyOrigin,
}

/// The resolved closure of one module, in order of first discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependencySet {
    module: ModuleId,
    members: Vec<ClosureMember>,
}

impl ResolvedDependencySet {
    /// The module this closure belongs to.
    #[must_use]
    pub fn module(&self) -> &ModuleId {
        &self.module
    }

    /// Members with their origins.
    #[must_use]
    pub fn members(&self) -> &[ClosureMember] {
        &self.members
    }

    /// Member identifiers in discovery order.
    pub fn ids(&self) -> impl Iterator<Item = &ModuleId> {
        self.members.iter().map(|m| &m.id)
    }

    /// Whether `id` is a member.
    #[must_use]
    pub fn contains(&self, id: &ModuleId) -> bool {
        self.members.iter().any(|m| &m.id == id)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the closure is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Dependencies to record in the module's manifest.
    ///
    /// [`ManifestDependencies::Direct`] lists declared and synthetic members;
    /// [`ManifestDependencies::Closure`] lists every member.
    #[must_use]
    pub fn manifest_dependencies(&self, mode: ManifestDependencies) -> Vec<ModuleId> {
        self.members
            .iter()
            .filter(|m| match mode {
                ManifestDependencies::Direct => m.origin != DependencyOrigin::Transitive,
                ManifestDependencies::Closure => true,
            })
            .map(|m| m.id.clone())
            .collect()
    }
}

/// Resolve the closure of `module`.
///
/// # Errors
///
/// Returns [`ResolveError::UnknownModule`] if `module` or any reachable
/// reference is unregistered, or [`ResolveError::CyclicDependency`] if the
/// reachable graph contains a cycle.
pub fn resolve_closure(
    module: &ModuleId,
    registry: &ModuleRegistry,
) -> Result<ResolvedDependencySet, ResolveError> {
    let root = registry
        .get(module)
        .ok_or_else(|| ResolveError::UnknownModule {
            module: module.clone(),
            referenced_by: None,
        })?;

    let mut walk = Walk {
        registry,
        root: module,
        path: vec![module.clone()],
        visited: HashSet::new(),
        members: Vec::new(),
    };
    for dependency in root.descriptor.declared_dependencies() {
        walk.visit(dependency, DependencyOrigin::Declared)?;
    }

    if let Some(logging) = registry.logging_module() {
        if needs_logging(module, logging, registry) {
            walk.inject(logging)?;
        }
    }

    log::debug!("resolved {module}: {} member(s)", walk.members.len());
    Ok(ResolvedDependencySet {
        module: module.clone(),
        members: walk.members,
    })
}

/// Resolve every registered module, in registration order.
///
/// Resolution is all-or-nothing: the first failure is returned and no
/// closure is produced.
///
/// # Errors
///
/// Returns the first [`ResolveError`] encountered.
pub fn resolve_all(registry: &ModuleRegistry) -> Result<Vec<ResolvedDependencySet>, ResolveError> {
    registry
        .identifiers()
        .map(|id| resolve_closure(id, registry))
        .collect()
}

/// Whether `module` receives the synthetic logging dependency.
fn needs_logging(module: &ModuleId, logging: &ModuleId, registry: &ModuleRegistry) -> bool {
    module != logging && !reaches(logging, module, registry)
}

/// Whether `target` is reachable from `from`. Unknown references and cycles
/// are left for the main walk to report.
fn reaches(from: &ModuleId, target: &ModuleId, registry: &ModuleRegistry) -> bool {
    let mut seen = HashSet::new();
    let mut stack = vec![from];
    while let Some(current) = stack.pop() {
        if !seen.insert(current) {
            continue;
        }
        let Some(entry) = registry.get(current) else {
            continue;
        };
        for dependency in entry.descriptor.declared_dependencies() {
            if dependency == target {
                return true;
            }
            stack.push(dependency);
        }
    }
    false
}

struct Walk<'a> {
    registry: &'a ModuleRegistry,
    root: &'a ModuleId,
    path: Vec<ModuleId>,
    visited: HashSet<ModuleId>,
    members: Vec<ClosureMember>,
}

impl Walk<'_> {
    /// Add the logging module as a synthetic member. A module already
    /// reached transitively is retagged so direct manifests still list it.
    fn inject(&mut self, logging: &ModuleId) -> Result<(), ResolveError> {
        if !self.visited.contains(logging) {
            return self.visit(logging, DependencyOrigin::Synthetic);
        }
        if let Some(member) = self
            .members
            .iter_mut()
            .find(|m| &m.id == logging && m.origin == DependencyOrigin::Transitive)
        {
            member.origin = DependencyOrigin::Synthetic;
        }
        Ok(())
    }

    fn visit(&mut self, id: &ModuleId, origin: DependencyOrigin) -> Result<(), ResolveError> {
        if let Some(start) = self.path.iter().position(|p| p == id) {
            let mut cycle = self.path.split_off(start);
            cycle.push(id.clone());
            return Err(ResolveError::CyclicDependency {
                module: self.root.clone(),
                cycle,
            });
        }
        if !self.visited.insert(id.clone()) {
            return Ok(());
        }

        let entry = self
            .registry
            .get(id)
            .ok_or_else(|| ResolveError::UnknownModule {
                module: id.clone(),
                referenced_by: self.path.last().cloned(),
            })?;
        self.members.push(ClosureMember {
            id: id.clone(),
            origin,
        });

        self.path.push(id.clone());
        for dependency in entry.descriptor.declared_dependencies() {
            self.visit(dependency, DependencyOrigin::Transitive)?;
        }
        self.path.pop();
        Ok(())
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
