//! Assembly of one module's distributable archive.
//!
//! [`assemble`] merges the module's compiled output with its bundled
//! libraries, relocates third-party packages, unions service registrations,
//! optionally strips unreachable library classes and injects the manifest
//! and license. The archive appears at its output path only once it is
//! complete.

pub mod classfile;
pub mod minimize;
pub mod relocation;
pub mod service_files;

pub(crate) mod archive;

use archive::{EntryOrigin, SourcedEntry};
use classfile::rewrite_utf8;
use distpack::registry::ModuleBuild;
use distpack_common::{DescriptorError, MANIFEST_PATH, ManifestDescriptor, Module, ModuleId};
use log::{debug, info};
use minimize::KeepList;
use relocation::RelocationMap;
use serde::Serialize;
use service_files::{ServiceFileMerger, is_service_file};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Path of the license inside each artifact.
pub const LICENSE_PATH: &str = "LICENSE.md";

/// Resource extensions whose contents are relocated as text.
const TEXT_EXTENSIONS: &[&str] = &[".properties", ".json", ".xml", ".conf", ".txt"];

/// Errors raised while assembling an artifact.
#[derive(Debug, Error)]
pub enum AssemblyError {
    /// The module has no compiled output, or it does not exist.
    #[error("module {module} has no compiled output ({})", configured_path(.path.as_deref()))]
    MissingCompiledOutput {
        /// Module being assembled.
        module: ModuleId,
        /// Configured path, when one was set.
        path: Option<PathBuf>,
    },

    /// A relocation root clashes with another mapping.
    #[error("relocation of {root} in module {module} collides: {reason}")]
    RelocationCollision {
        /// Module declaring the relocation.
        module: ModuleId,
        /// The clashing root.
        root: String,
        /// What it clashes with.
        reason: String,
    },

    /// A relocation root is not a valid package name.
    #[error("module {module} declares invalid relocation root {root:?}")]
    InvalidRelocation {
        /// Module declaring the relocation.
        module: ModuleId,
        /// The malformed root.
        root: String,
    },

    /// An input archive or class file is malformed.
    #[error("malformed archive {}: {reason}", .archive.display())]
    ArchiveIntegrity {
        /// The offending input.
        archive: PathBuf,
        /// Description of the defect.
        reason: String,
    },

    /// The output archive could not be written.
    #[error("failed to write {}: {reason}", .path.display())]
    ArchiveWrite {
        /// Output path.
        path: PathBuf,
        /// Description of the failure.
        reason: String,
    },

    /// A minimization keep pattern does not compile.
    #[error("invalid keep pattern {pattern:?}: {source}")]
    InvalidKeepPattern {
        /// The pattern as configured.
        pattern: String,
        /// Compilation error.
        source: regex::Error,
    },

    /// The manifest could not be serialized.
    #[error(transparent)]
    Manifest(#[from] DescriptorError),

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// An assembly worker panicked.
    #[error("assembly of module {module} panicked")]
    WorkerPanicked {
        /// Module being assembled.
        module: ModuleId,
    },
}

fn configured_path(path: Option<&Path>) -> String {
    path.map_or_else(|| "not configured".to_owned(), |p| format!("{} not found", p.display()))
}

impl AssemblyError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Everything needed to assemble one module.
#[derive(Debug, Clone, Copy)]
pub struct AssemblyRequest<'a> {
    /// The module being assembled.
    pub module: &'a Module,
    /// Descriptors of the modules in its resolved closure.
    ///
    /// Their packages are provided by the host at runtime, so library
    /// entries under them are not bundled again.
    pub closure: &'a [&'a Module],
    /// Compiled output, libraries and minimization settings.
    pub build: &'a ModuleBuild,
    /// The module's relocation rules.
    pub relocations: &'a RelocationMap,
    /// Manifest injected at `plugin.json`.
    pub manifest: &'a ManifestDescriptor,
    /// License text injected at `LICENSE.md`.
    pub license: Option<&'a [u8]>,
    /// Final archive path.
    pub output_path: &'a Path,
}

/// A completed artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssembledArtifact {
    /// Module the artifact belongs to.
    pub module: ModuleId,
    /// Archive path.
    pub path: PathBuf,
    /// Hex SHA-256 of the archive.
    pub sha256: String,
    /// Number of file entries.
    pub entries: usize,
}

/// Assemble the artifact described by `request`.
///
/// # Errors
///
/// Returns [`AssemblyError`] if an input is missing or malformed, a class
/// cannot be relocated, or the archive cannot be written. Nothing is left
/// at the output path on failure.
pub fn assemble(request: &AssemblyRequest<'_>) -> Result<AssembledArtifact, AssemblyError> {
    let module = request.module.identifier();
    let own_output = request
        .build
        .compiled_output
        .as_ref()
        .map(|p| p.as_std_path())
        .filter(|p| p.exists())
        .ok_or_else(|| AssemblyError::MissingCompiledOutput {
            module: module.clone(),
            path: request
                .build
                .compiled_output
                .as_ref()
                .map(|p| p.clone().into_std_path_buf()),
        })?;
    let source_of =
        |origin: EntryOrigin| archive::origin_path(origin, own_output, &request.build.libraries);

    let mut entries = collect_inputs(request, own_output)?;
    if request.build.minimize {
        let keep = KeepList::new(&request.build.minimize_keep)?;
        let coordinates: Vec<&str> = request
            .build
            .libraries
            .iter()
            .map(|l| l.coordinate.as_str())
            .collect();
        let removed =
            minimize::unreachable_library_classes(&entries, &coordinates, &keep, source_of)?;
        debug!("{module}: minimization removed {} classes", removed.len());
        entries = entries
            .into_iter()
            .enumerate()
            .filter(|(index, _)| !removed.contains(index))
            .map(|(_, entry)| entry)
            .collect();
    }

    let mut files = vec![(MANIFEST_PATH.to_owned(), request.manifest.serialize()?)];
    if let Some(license) = request.license {
        files.push((LICENSE_PATH.to_owned(), license.to_vec()));
    }
    files.extend(merge(entries, request.relocations, &source_of)?);

    let sha256 = archive::write_archive(request.output_path, &files)?;
    info!(
        "{module}: wrote {} ({} entries)",
        request.output_path.display(),
        files.len()
    );
    Ok(AssembledArtifact {
        module: module.clone(),
        path: request.output_path.to_path_buf(),
        sha256,
        entries: files.len(),
    })
}

/// Own entries followed by library entries, with excluded entries dropped.
fn collect_inputs(
    request: &AssemblyRequest<'_>,
    own_output: &Path,
) -> Result<Vec<SourcedEntry>, AssemblyError> {
    let provided: Vec<String> = request
        .closure
        .iter()
        .filter_map(|m| m.source_package())
        .map(|package| format!("{}/", package.replace('.', "/")))
        .collect();

    let mut entries = Vec::new();
    let own = archive::read_compiled_output(own_output)?;
    entries.extend(own.into_iter().map(|(name, data)| SourcedEntry {
        name,
        data,
        origin: EntryOrigin::Own,
    }));
    for (index, library) in request.build.libraries.iter().enumerate() {
        let contents = archive::read_jar(library.path.as_std_path())?;
        entries.extend(contents.into_iter().map(|(name, data)| SourcedEntry {
            name,
            data,
            origin: EntryOrigin::Library(index),
        }));
    }

    entries.retain(|entry| {
        let keep = !is_excluded(entry, &provided);
        if !keep {
            debug!("{}: dropping {}", request.module.identifier(), entry.name);
        }
        keep
    });
    Ok(entries)
}

fn is_excluded(entry: &SourcedEntry, provided: &[String]) -> bool {
    let name = entry.name.as_str();
    if name == MANIFEST_PATH || name == LICENSE_PATH || archive::is_signature_file(name) {
        return true;
    }
    match entry.origin {
        EntryOrigin::Own => false,
        EntryOrigin::Library(_) => {
            archive::is_module_descriptor(name)
                || name == "META-INF/MANIFEST.MF"
                || provided.iter().any(|package| name.starts_with(package.as_str()))
        }
    }
}

/// Relocate every entry, keep the first entry at each path and union
/// service files.
fn merge(
    entries: Vec<SourcedEntry>,
    relocations: &RelocationMap,
    source_of: &impl Fn(EntryOrigin) -> PathBuf,
) -> Result<Vec<(String, Vec<u8>)>, AssemblyError> {
    let mut seen = HashSet::new();
    let mut files = Vec::with_capacity(entries.len());
    let mut services = ServiceFileMerger::new();

    for entry in entries {
        let name = relocations.relocate_str(&entry.name).into_owned();
        let data = relocate_contents(&name, entry.data, relocations).map_err(|reason| {
            AssemblyError::ArchiveIntegrity {
                archive: source_of(entry.origin),
                reason: format!("{}: {reason}", entry.name),
            }
        })?;

        if is_service_file(&name) {
            services.add(&name, &String::from_utf8_lossy(&data));
            continue;
        }
        if !seen.insert(name.clone()) {
            debug!("duplicate entry {name} from {} skipped", source_of(entry.origin).display());
            continue;
        }
        files.push((name, data));
    }

    files.extend(services.into_entries());
    Ok(files)
}

fn relocate_contents(
    name: &str,
    data: Vec<u8>,
    relocations: &RelocationMap,
) -> Result<Vec<u8>, classfile::ClassFileError> {
    if relocations.is_empty() {
        return Ok(data);
    }
    if name.ends_with(".class") {
        return Ok(rewrite_utf8(&data, |text| relocations.relocate_bytes(text))?.unwrap_or(data));
    }
    let is_text = is_service_file(name) || TEXT_EXTENSIONS.iter().any(|ext| name.ends_with(ext));
    if is_text && std::str::from_utf8(&data).is_ok() {
        return Ok(relocations.relocate_bytes(&data).unwrap_or(data));
    }
    Ok(data)
}

#[cfg(test)]
#[path = "assemble_tests.rs"]
mod tests;
