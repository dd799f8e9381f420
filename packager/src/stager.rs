//! Local host instance staging and launch.
//!
//! [`stage_runtime`] copies a module's artifact, the artifacts of its
//! resolved closure and any plugin companions into the host instance's
//! plugin directory, and places the host runtime jar in the instance
//! directory. [`launch_host`] then starts the host through a
//! [`HostLauncher`].

use crate::resolver::ResolvedDependencySet;
use distpack_common::ModuleId;
use log::{debug, info};
use std::collections::{HashMap, HashSet};
use std::ffi::OsStr;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use thiserror::Error;

/// Errors raised while staging or launching a host instance.
#[derive(Debug, Error)]
pub enum StagingError {
    /// A module in the closure has no assembled artifact.
    #[error("no assembled artifact for module {module}")]
    MissingArtifact {
        /// The module without an artifact.
        module: ModuleId,
    },

    /// The host runtime jar is not present.
    #[error("host runtime not found at {}; run `distpack fetch` first", .path.display())]
    MissingHostRuntime {
        /// Expected jar path.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", .path.display())]
    Io {
        /// Path being accessed.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The host process could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        /// Program being run.
        program: String,
        /// Underlying error.
        source: io::Error,
    },

    /// The host process exited unsuccessfully.
    #[error("host exited with {status}")]
    HostExited {
        /// Exit status of the host.
        status: ExitStatus,
    },
}

impl StagingError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// A local host instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostInstance {
    /// Fetched host runtime jar.
    pub runtime_jar: PathBuf,
    /// Working directory of the instance.
    pub instance_dir: PathBuf,
    /// Plugin directory, relative to the instance directory.
    pub plugin_dir: PathBuf,
    /// Java executable.
    pub java: String,
    /// Extra arguments passed after `-jar <host>`.
    pub args: Vec<String>,
}

impl HostInstance {
    /// Absolute plugin directory.
    #[must_use]
    pub fn plugin_path(&self) -> PathBuf {
        self.instance_dir.join(&self.plugin_dir)
    }
}

/// The result of staging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRuntime {
    /// Host jar inside the instance directory.
    pub host_jar: PathBuf,
    /// Files copied into the plugin directory, in copy order.
    pub plugins: Vec<PathBuf>,
}

/// A process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    /// Executable.
    pub program: String,
    /// Arguments.
    pub args: Vec<String>,
    /// Working directory.
    pub working_dir: PathBuf,
}

impl LaunchCommand {
    /// `java -jar <host jar> [args]` in the instance directory.
    #[must_use]
    pub fn for_host(host: &HostInstance, staged: &StagedRuntime) -> Self {
        let mut args = vec![
            "-jar".to_owned(),
            staged.host_jar.to_string_lossy().into_owned(),
        ];
        args.extend(host.args.iter().cloned());
        Self {
            program: host.java.clone(),
            args,
            working_dir: host.instance_dir.clone(),
        }
    }
}

/// Starts a host process and waits for it.
#[cfg_attr(test, mockall::automock)]
pub trait HostLauncher {
    /// Run `command` to completion.
    ///
    /// # Errors
    ///
    /// Returns [`StagingError::Launch`] if the process cannot be spawned.
    fn launch(&self, command: &LaunchCommand) -> Result<ExitStatus, StagingError>;
}

/// Launches the host as a child process inheriting stdio.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

impl HostLauncher for ProcessLauncher {
    fn launch(&self, command: &LaunchCommand) -> Result<ExitStatus, StagingError> {
        Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .status()
            .map_err(|source| StagingError::Launch {
                program: command.program.clone(),
                source,
            })
    }
}

/// Stage `target` and its closure into the host instance.
///
/// `artifacts` maps each assembled module to its archive. Companions are
/// copied after the module artifacts.
///
/// # Errors
///
/// Returns [`StagingError::MissingHostRuntime`] if the host jar is absent,
/// [`StagingError::MissingArtifact`] if a module in the closure has not been
/// assembled, or [`StagingError::Io`] if copying fails. Nothing is copied
/// when a precondition fails.
///
/// Plugin files from an earlier staging that are not part of this one are
/// removed, so a bumped artifact version never loads next to the old one.
pub fn stage_runtime(
    target: &ModuleId,
    closure: &ResolvedDependencySet,
    artifacts: &HashMap<ModuleId, PathBuf>,
    companions: &[PathBuf],
    host: &HostInstance,
) -> Result<StagedRuntime, StagingError> {
    if !host.runtime_jar.is_file() {
        return Err(StagingError::MissingHostRuntime {
            path: host.runtime_jar.clone(),
        });
    }
    let mut sources = Vec::with_capacity(closure.len() + 1 + companions.len());
    for module in std::iter::once(target).chain(closure.ids()) {
        let artifact = artifacts
            .get(module)
            .ok_or_else(|| StagingError::MissingArtifact {
                module: module.clone(),
            })?;
        sources.push(artifact.as_path());
    }
    sources.extend(companions.iter().map(PathBuf::as_path));

    let plugin_dir = host.plugin_path();
    fs::create_dir_all(&plugin_dir).map_err(StagingError::io(&plugin_dir))?;
    let keep: HashSet<&OsStr> = sources.iter().filter_map(|s| s.file_name()).collect();
    remove_stale_plugins(&plugin_dir, &keep)?;
    let mut plugins = Vec::with_capacity(sources.len());
    for source in sources {
        plugins.push(copy_into(source, &plugin_dir)?);
    }

    let host_jar = copy_into(&host.runtime_jar, &host.instance_dir)?;
    info!(
        "staged {target} with {} plugin file(s) in {}",
        plugins.len(),
        plugin_dir.display()
    );
    Ok(StagedRuntime { host_jar, plugins })
}

/// Remove plugin files left by an earlier staging that `keep` does not name.
///
/// Subdirectories hold plugin configuration and are left alone.
fn remove_stale_plugins(plugin_dir: &Path, keep: &HashSet<&OsStr>) -> Result<(), StagingError> {
    for entry in fs::read_dir(plugin_dir).map_err(StagingError::io(plugin_dir))? {
        let entry = entry.map_err(StagingError::io(plugin_dir))?;
        let path = entry.path();
        let file_type = entry.file_type().map_err(StagingError::io(&path))?;
        if file_type.is_dir() || keep.contains(entry.file_name().as_os_str()) {
            continue;
        }
        debug!("removing stale plugin {}", path.display());
        fs::remove_file(&path).map_err(StagingError::io(&path))?;
    }
    Ok(())
}

/// Launch the staged host and wait for it to exit.
///
/// # Errors
///
/// Returns [`StagingError::Launch`] if the host cannot start, or
/// [`StagingError::HostExited`] if it exits unsuccessfully.
pub fn launch_host(
    launcher: &dyn HostLauncher,
    host: &HostInstance,
    staged: &StagedRuntime,
) -> Result<(), StagingError> {
    let command = LaunchCommand::for_host(host, staged);
    debug!("launching {} {}", command.program, command.args.join(" "));
    let status = launcher.launch(&command)?;
    if status.success() {
        Ok(())
    } else {
        Err(StagingError::HostExited { status })
    }
}

fn copy_into(source: &Path, directory: &Path) -> Result<PathBuf, StagingError> {
    let name = source
        .file_name()
        .ok_or_else(|| StagingError::Io {
            path: source.to_path_buf(),
            source: io::Error::new(io::ErrorKind::InvalidInput, "path has no file name"),
        })?;
    let destination = directory.join(name);
    if destination != source {
        fs::create_dir_all(directory).map_err(StagingError::io(directory))?;
        fs::copy(source, &destination).map_err(StagingError::io(source))?;
    }
    Ok(destination)
}

#[cfg(test)]
#[path = "stager_tests.rs"]
mod tests;
