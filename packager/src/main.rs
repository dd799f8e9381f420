//! distpack CLI entrypoint.
//!
//! This binary loads `distpack.toml`, builds the module registry and runs
//! one subcommand. Machine-readable results (`resolve`, `manifest`) go to
//! stdout; progress lines and errors go to stderr.

use camino::Utf8Path;
use clap::Parser;
use distpack::{ModuleRegistry, ProjectConfig};
use distpack_common::{ModuleId, to_manifest};
use distpack_packager::bundle::download_bundles;
use distpack_packager::cli::{Cli, Command};
use distpack_packager::dirs::{SystemBaseDirs, default_cache_dir};
use distpack_packager::error::{PackagerError, Result};
use distpack_packager::fetch::download::HttpSource;
use distpack_packager::output::{artifact_line, asset_line, closure_text, write_stderr_line};
use distpack_packager::pipeline::{BuildPlan, CancellationFlag, fetch_assets, host_instance};
use distpack_packager::resolver::resolve_closure;
use distpack_packager::stager::{ProcessLauncher, launch_host, stage_runtime};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;

struct RunContext<'a> {
    cli: &'a Cli,
    config: &'a ProjectConfig,
    registry: &'a ModuleRegistry,
}

impl RunContext<'_> {
    fn progress(&self, stderr: &mut dyn Write, message: impl std::fmt::Display) {
        if !self.cli.quiet {
            write_stderr_line(stderr, message);
        }
    }

    fn cache_dir(&self) -> Result<PathBuf> {
        match self.cli.cache_dir.as_deref() {
            Some(dir) => Ok(dir.as_std_path().to_path_buf()),
            None => default_cache_dir(&SystemBaseDirs).ok_or(PackagerError::CacheDirUnavailable),
        }
    }
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    let mut stdout = std::io::stdout();
    let mut stderr = std::io::stderr();
    let run_result = run(&cli, &mut stdout, &mut stderr);
    let exit_code = exit_code_for_run_result(run_result, &mut stderr);
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
}

fn run(cli: &Cli, stdout: &mut dyn Write, stderr: &mut dyn Write) -> Result<()> {
    let config = ProjectConfig::load(&cli.config)?;
    let registry = ModuleRegistry::from_config(&config)?;
    let context = RunContext {
        cli,
        config: &config,
        registry: &registry,
    };

    match &cli.command {
        Command::Resolve { module } => print_closure(&context, module, stdout),
        Command::Manifest { module } => print_manifest(&context, module, stdout),
        Command::Assemble { modules } => assemble_modules(&context, modules, stderr),
        Command::Fetch => fetch_pinned(&context, stderr),
        Command::Bundles { output } => prepare_bundles(&context, output.as_deref(), stderr),
        Command::Run { module, no_launch } => run_module(&context, module, *no_launch, stderr),
    }
}

fn parse_module(name: &str) -> Result<ModuleId> {
    ModuleId::try_from(name).map_err(|_| PackagerError::UnknownModule {
        name: name.to_owned(),
    })
}

/// Prints the resolved closure of one module.
fn print_closure(context: &RunContext<'_>, module: &str, stdout: &mut dyn Write) -> Result<()> {
    let closure = resolve_closure(&parse_module(module)?, context.registry)?;
    if !closure.is_empty() {
        writeln!(stdout, "{}", closure_text(&closure))?;
    }
    Ok(())
}

/// Prints the manifest synthesized for one module.
fn print_manifest(context: &RunContext<'_>, module: &str, stdout: &mut dyn Write) -> Result<()> {
    let id = parse_module(module)?;
    let closure = resolve_closure(&id, context.registry)?;
    let registered = context
        .registry
        .get(&id)
        .ok_or_else(|| PackagerError::UnknownModule {
            name: module.to_owned(),
        })?;
    let dependencies = closure.manifest_dependencies(context.config.project.manifest_dependencies);
    let manifest = to_manifest(
        &registered.descriptor,
        &context.config.metadata(),
        &dependencies,
    )?;
    stdout.write_all(&manifest.serialize()?)?;
    writeln!(stdout)?;
    Ok(())
}

/// Plans the build and assembles the requested modules.
fn assemble_modules(
    context: &RunContext<'_>,
    modules: &[String],
    stderr: &mut dyn Write,
) -> Result<()> {
    let plan = BuildPlan::prepare(context.config, context.registry)?;
    let selected = plan.select(modules)?;
    let artifacts = plan.assemble(&selected, &CancellationFlag::new())?;
    for artifact in &artifacts {
        context.progress(stderr, artifact_line(artifact));
    }
    Ok(())
}

/// Fetches every pinned asset into the cache.
fn fetch_pinned(context: &RunContext<'_>, stderr: &mut dyn Write) -> Result<()> {
    let cache_dir = context.cache_dir()?;
    let assets = fetch_assets(&HttpSource, context.config, &cache_dir)?;
    for asset in assets.host.iter().chain(&assets.companions) {
        context.progress(stderr, asset_line(asset));
    }
    Ok(())
}

/// Downloads and rewrites the host localization bundles.
fn prepare_bundles(
    context: &RunContext<'_>,
    output: Option<&Utf8Path>,
    stderr: &mut dyn Write,
) -> Result<()> {
    let bundles = context
        .config
        .bundles
        .as_ref()
        .ok_or(PackagerError::BundlesNotConfigured)?;
    let destination = output.map_or_else(
        || context.config.resolve_path(&bundles.output_dir),
        Utf8Path::to_path_buf,
    );
    let set = download_bundles(
        &HttpSource,
        &bundles.version,
        &bundles.path_pattern,
        destination.as_std_path(),
    )?;
    context.progress(
        stderr,
        format!("wrote {} bundle file(s) to {destination}", set.files.len()),
    );
    Ok(())
}

/// Assembles a module and its closure, stages them and launches the host.
fn run_module(
    context: &RunContext<'_>,
    module: &str,
    no_launch: bool,
    stderr: &mut dyn Write,
) -> Result<()> {
    let id = parse_module(module)?;
    let cache_dir = context.cache_dir()?;
    let assets = fetch_assets(&HttpSource, context.config, &cache_dir)?;
    let host = assets.host.ok_or(PackagerError::HostNotConfigured)?;

    let plan = BuildPlan::prepare(context.config, context.registry)?;
    let selected = plan.with_closure(&id)?;
    let closure = selected
        .first()
        .map(|target| target.closure.clone())
        .ok_or_else(|| PackagerError::UnknownModule {
            name: module.to_owned(),
        })?;
    let artifacts: HashMap<ModuleId, PathBuf> = plan
        .assemble(&selected, &CancellationFlag::new())?
        .into_iter()
        .map(|artifact| (artifact.module, artifact.path))
        .collect();

    let companions: Vec<PathBuf> = assets
        .companions
        .into_iter()
        .map(|asset| asset.local_path)
        .collect();
    let instance = host_instance(context.config, host.local_path);
    let staged = stage_runtime(&id, &closure, &artifacts, &companions, &instance)?;
    context.progress(
        stderr,
        format!(
            "staged {} plugin file(s) into {}",
            staged.plugins.len(),
            instance.plugin_path().display()
        ),
    );

    if no_launch {
        return Ok(());
    }
    context.progress(stderr, format!("launching {}", staged.host_jar.display()));
    launch_host(&ProcessLauncher, &instance, &staged)?;
    Ok(())
}

fn exit_code_for_run_result(result: Result<()>, stderr: &mut dyn Write) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            write_stderr_line(stderr, err);
            1
        }
    }
}
