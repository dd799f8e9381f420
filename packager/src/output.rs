//! Output formatting for the packager CLI.
//!
//! Progress lines go to stderr so that `resolve` and `manifest` can print
//! machine-readable results on stdout.

use crate::assemble::AssembledArtifact;
use crate::fetch::FetchedAsset;
use crate::resolver::{DependencyOrigin, ResolvedDependencySet};
use std::io::Write;

/// Write one line to `stderr`, ignoring write failures.
pub fn write_stderr_line(stderr: &mut dyn Write, message: impl std::fmt::Display) {
    if writeln!(stderr, "{message}").is_err() {
        // Best-effort output; nothing useful to do on failure.
    }
}

/// Format a resolved closure, one member per line with its origin.
///
/// # Example
///
/// ```
/// use distpack::ModuleRegistry;
/// use distpack::registry::ModuleBuild;
/// use distpack_common::{Module, ModuleId};
/// use distpack_packager::output::closure_text;
/// use distpack_packager::resolver::resolve_closure;
///
/// let api = ModuleId::try_from("api").expect("valid identifier");
/// let core = ModuleId::try_from("core").expect("valid identifier");
/// let mut registry = ModuleRegistry::new(None);
/// registry
///     .register(Module::builder(api.clone()).build().expect("valid"), ModuleBuild::default())
///     .expect("unique");
/// registry
///     .register(
///         Module::builder(core.clone()).depends_on(api).build().expect("valid"),
///         ModuleBuild::default(),
///     )
///     .expect("unique");
///
/// let closure = resolve_closure(&core, &registry).expect("resolves");
/// assert_eq!(closure_text(&closure), "api (declared)");
/// ```
#[must_use]
pub fn closure_text(closure: &ResolvedDependencySet) -> String {
    closure
        .members()
        .iter()
        .map(|member| {
            let origin = match member.origin {
                DependencyOrigin::Declared => "declared",
                DependencyOrigin::Transitive => "transitive",
                DependencyOrigin::Synthetic => "synthetic",
            };
            format!("{} ({origin})", member.id)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format the summary line for an assembled artifact.
#[must_use]
pub fn artifact_line(artifact: &AssembledArtifact) -> String {
    let plural = if artifact.entries == 1 { "entry" } else { "entries" };
    format!(
        "{}: {} ({} {plural}, sha256 {})",
        artifact.module,
        artifact.path.display(),
        artifact.entries,
        artifact.sha256
    )
}

/// Format the summary line for a fetched asset.
#[must_use]
pub fn asset_line(asset: &FetchedAsset) -> String {
    format!(
        "{} @ {}: {} (sha256 {})",
        asset.source_uri,
        asset.version_key,
        asset.local_path.display(),
        asset.sha256
    )
}
