//! Build orchestration.
//!
//! A build runs in two phases. [`BuildPlan::prepare`] resolves every
//! module, derives relocation maps, checks them against one build-wide
//! ledger and synthesizes every manifest; any failure there stops the build
//! before a file is written. [`BuildPlan::assemble`] then assembles the
//! selected modules in parallel, one scoped thread per module.

use crate::assemble::relocation::{RelocationLedger, RelocationMap};
use crate::assemble::{AssembledArtifact, AssemblyError, AssemblyRequest, assemble};
use crate::error::{PackagerError, Result};
use crate::fetch::download::RemoteSource;
use crate::fetch::{FetchRequest, FetchedAsset, fetch_all};
use crate::resolver::{ResolvedDependencySet, resolve_all};
use crate::stager::HostInstance;
use distpack::config::AssetRole;
use distpack::{ModuleRegistry, ProjectConfig};
use distpack_common::{ManifestDescriptor, Module, ModuleId, to_manifest};
use log::{debug, info, warn};
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};

/// Shared flag that stops modules from starting once set.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    /// Create an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything decided about one module before assembly.
#[derive(Debug, Clone)]
pub struct ModulePlan {
    /// Resolved closure; its module is the one being planned.
    pub closure: ResolvedDependencySet,
    /// Relocation rules.
    pub relocations: RelocationMap,
    /// Manifest to inject.
    pub manifest: ManifestDescriptor,
    /// Archive path.
    pub output_path: PathBuf,
}

impl ModulePlan {
    /// The planned module.
    #[must_use]
    pub fn module(&self) -> &ModuleId {
        self.closure.module()
    }
}

/// A validated build over every registered module.
#[derive(Debug)]
pub struct BuildPlan<'a> {
    registry: &'a ModuleRegistry,
    modules: Vec<ModulePlan>,
    license: Option<Vec<u8>>,
}

impl<'a> BuildPlan<'a> {
    /// Resolve and validate every module of `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::Resolve`] on cycles or unknown dependencies,
    /// [`PackagerError::Assembly`] on invalid or colliding relocations,
    /// [`PackagerError::Descriptor`] when a manifest cannot be synthesized,
    /// or [`PackagerError::License`] if the license cannot be read.
    pub fn prepare(config: &ProjectConfig, registry: &'a ModuleRegistry) -> Result<Self> {
        let closures = resolve_all(registry)?;
        let metadata = config.metadata();
        let output_dir = config.resolve_path(&config.project.output_dir);
        let mut ledger = RelocationLedger::new();
        let mut modules = Vec::with_capacity(closures.len());

        for closure in closures {
            let registered = lookup(registry, closure.module())?;
            let relocations = RelocationMap::for_module(
                &registered.descriptor,
                &registered.build.relocations,
                &config.project.relocation_prefix,
            )?;
            ledger.record(closure.module(), &relocations)?;

            let dependencies = closure.manifest_dependencies(config.project.manifest_dependencies);
            let manifest = to_manifest(&registered.descriptor, &metadata, &dependencies)?;
            let output_path = output_dir
                .join(format!("{}-{}.jar", closure.module(), manifest.version))
                .into_std_path_buf();
            debug!(
                "planned {} with {} closure member(s) and {} relocation(s)",
                closure.module(),
                closure.len(),
                relocations.rules().len()
            );
            modules.push(ModulePlan {
                closure,
                relocations,
                manifest,
                output_path,
            });
        }

        let license = match config.project.license.as_deref() {
            Some(path) => {
                let path = config.resolve_path(path);
                Some(fs::read(&path).map_err(|source| PackagerError::License { path, source })?)
            }
            None => None,
        };

        Ok(Self {
            registry,
            modules,
            license,
        })
    }

    /// Every planned module in registration order.
    #[must_use]
    pub fn modules(&self) -> &[ModulePlan] {
        &self.modules
    }

    /// The plan of one module.
    #[must_use]
    pub fn get(&self, module: &ModuleId) -> Option<&ModulePlan> {
        self.modules.iter().find(|plan| plan.module() == module)
    }

    /// Plans for the named modules, or every module when `names` is empty.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnknownModule`] for a name that is not
    /// registered.
    pub fn select(&self, names: &[String]) -> Result<Vec<&ModulePlan>> {
        if names.is_empty() {
            return Ok(self.modules.iter().collect());
        }
        names
            .iter()
            .map(|name| {
                ModuleId::try_from(name.as_str())
                    .ok()
                    .and_then(|id| self.get(&id))
                    .ok_or_else(|| PackagerError::UnknownModule { name: name.clone() })
            })
            .collect()
    }

    /// The plan of `module` followed by the plans of its closure.
    ///
    /// # Errors
    ///
    /// Returns [`PackagerError::UnknownModule`] if `module` or a member of
    /// its closure is not planned.
    pub fn with_closure(&self, module: &ModuleId) -> Result<Vec<&ModulePlan>> {
        let plan = self.get(module).ok_or_else(|| PackagerError::UnknownModule {
            name: module.to_string(),
        })?;
        std::iter::once(module)
            .chain(plan.closure.ids())
            .map(|id| {
                self.get(id)
                    .ok_or_else(|| PackagerError::UnknownModule { name: id.to_string() })
            })
            .collect()
    }

    /// Assemble `selected` in parallel.
    ///
    /// At most one worker per available CPU runs at a time. Workers take
    /// modules in `selected` order and check `cancel` before starting each
    /// one; the first failure sets it, so modules still queued are skipped.
    /// Modules already running finish. Artifacts are returned in the order of
    /// `selected`.
    ///
    /// # Errors
    ///
    /// Returns the first assembly failure in `selected` order, or
    /// [`PackagerError::Cancelled`] if the build was cancelled externally.
    pub fn assemble(
        &self,
        selected: &[&ModulePlan],
        cancel: &CancellationFlag,
    ) -> Result<Vec<AssembledArtifact>> {
        let workers = std::thread::available_parallelism().map_or(1, NonZeroUsize::get);
        self.assemble_on(selected, cancel, workers)
    }

    fn assemble_on(
        &self,
        selected: &[&ModulePlan],
        cancel: &CancellationFlag,
        workers: usize,
    ) -> Result<Vec<AssembledArtifact>> {
        let workers = workers.clamp(1, selected.len().max(1));
        info!(
            "assembling {} module(s) on {workers} worker(s)",
            selected.len()
        );
        let next = AtomicUsize::new(0);
        let (sender, receiver) = mpsc::channel();
        std::thread::scope(|scope| {
            let handles: Vec<_> = (0..workers)
                .map(|_| {
                    let sender = sender.clone();
                    let next = &next;
                    scope.spawn(move || {
                        while let Some(index) = claim(next, selected.len()) {
                            let Some(&plan) = selected.get(index) else {
                                break;
                            };
                            let result = if cancel.is_cancelled() {
                                Err(PackagerError::Cancelled)
                            } else {
                                let result = self.assemble_one(plan);
                                if result.is_err() {
                                    cancel.cancel();
                                }
                                result
                            };
                            if sender.send((index, result)).is_err() {
                                break;
                            }
                        }
                    })
                })
                .collect();
            for handle in handles {
                if handle.join().is_err() {
                    warn!("assembly worker panicked");
                    cancel.cancel();
                }
            }
        });
        drop(sender);

        let mut slots: Vec<Option<Result<AssembledArtifact>>> =
            selected.iter().map(|_| None).collect();
        for (index, result) in receiver {
            if let Some(slot) = slots.get_mut(index) {
                *slot = Some(result);
            }
        }

        let mut artifacts = Vec::with_capacity(slots.len());
        let mut cancelled = false;
        let mut failure = None;
        for (slot, plan) in slots.into_iter().zip(selected) {
            let result = slot.unwrap_or_else(|| {
                Err(AssemblyError::WorkerPanicked {
                    module: plan.module().clone(),
                }
                .into())
            });
            match result {
                Ok(artifact) => artifacts.push(artifact),
                Err(PackagerError::Cancelled) => cancelled = true,
                Err(err) => {
                    failure.get_or_insert(err);
                }
            }
        }
        match (failure, cancelled) {
            (Some(err), _) => Err(err),
            (None, true) => Err(PackagerError::Cancelled),
            (None, false) => Ok(artifacts),
        }
    }

    fn assemble_one(&self, plan: &ModulePlan) -> Result<AssembledArtifact> {
        let registered = lookup(self.registry, plan.module())?;
        let closure = plan
            .closure
            .ids()
            .map(|id| lookup(self.registry, id).map(|m| &m.descriptor))
            .collect::<Result<Vec<&Module>>>()?;
        let request = AssemblyRequest {
            module: &registered.descriptor,
            closure: &closure,
            build: &registered.build,
            relocations: &plan.relocations,
            manifest: &plan.manifest,
            license: self.license.as_deref(),
            output_path: &plan.output_path,
        };
        Ok(assemble(&request)?)
    }
}

/// Take the next queued index, or `None` once all `len` are claimed.
fn claim(next: &AtomicUsize, len: usize) -> Option<usize> {
    let index = next.fetch_add(1, Ordering::SeqCst);
    (index < len).then_some(index)
}

fn lookup<'r>(
    registry: &'r ModuleRegistry,
    module: &ModuleId,
) -> Result<&'r distpack::RegisteredModule> {
    registry.get(module).ok_or_else(|| PackagerError::UnknownModule {
        name: module.to_string(),
    })
}

/// Fetched assets split by runtime role.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuntimeAssets {
    /// The host runtime jar, if one is configured.
    pub host: Option<FetchedAsset>,
    /// Companions for the plugin directory.
    pub companions: Vec<FetchedAsset>,
}

/// One fetch request per `[[fetch]]` entry, cached under `cache_dir`.
#[must_use]
pub fn fetch_requests(config: &ProjectConfig, cache_dir: &Path) -> Vec<FetchRequest> {
    config
        .fetch
        .iter()
        .map(|entry| FetchRequest {
            uri: entry.resolved_url(),
            version_key: entry.version.clone(),
            destination: cache_dir.join(&entry.name),
            file_name: entry.file_name.clone(),
        })
        .collect()
}

/// Fetch every configured asset in parallel.
///
/// # Errors
///
/// Returns [`PackagerError::Config`] if more than one entry has the host
/// role, before anything is downloaded, or the first
/// [`FetchError`](crate::fetch::FetchError) in configuration order.
pub fn fetch_assets(
    source: &(dyn RemoteSource + Sync),
    config: &ProjectConfig,
    cache_dir: &Path,
) -> Result<RuntimeAssets> {
    config.host_asset()?;
    let requests = fetch_requests(config, cache_dir);
    let fetched = fetch_all(source, &requests)?;
    let mut assets = RuntimeAssets::default();
    for (entry, asset) in config.fetch.iter().zip(fetched) {
        match entry.role {
            AssetRole::Host => assets.host = Some(asset),
            AssetRole::Plugin => assets.companions.push(asset),
        }
    }
    Ok(assets)
}

/// The host instance described by `[runtime]`, running `runtime_jar`.
#[must_use]
pub fn host_instance(config: &ProjectConfig, runtime_jar: PathBuf) -> HostInstance {
    HostInstance {
        runtime_jar,
        instance_dir: config
            .resolve_path(&config.runtime.instance_dir)
            .into_std_path_buf(),
        plugin_dir: config.runtime.plugin_dir.clone().into_std_path_buf(),
        java: config.runtime.java.clone(),
        args: config.runtime.host_args.clone(),
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
