//! Tests for build planning and parallel assembly.

use super::*;
use crate::test_utils::{ClassFileBuilder, read_jar};
use camino::Utf8Path;
use rstest::{fixture, rstest};
use tempfile::TempDir;

const PROJECT: &str = r#"
[project]
version = "1.0.0"
minimum_host_version = "146"
logging_module = "logging"
relocation_prefix = "com.example.shadow"
output_dir = "out"

[[modules]]
identifier = "core"
main = "com.example.core.Core"
compiled_output = "classes/core"

[[modules]]
identifier = "logging"
main = "com.example.logging.Logging"
compiled_output = "classes/logging"

[[modules]]
identifier = "permissions"
main = "com.example.permissions.Permissions"
dependencies = ["core"]
compiled_output = "classes/permissions"

[[modules]]
identifier = "commands"
main = "com.example.commands.Commands"
dependencies = ["core", "permissions"]
compiled_output = "classes/commands"
"#;

struct Project {
    dir: TempDir,
    config: ProjectConfig,
    registry: ModuleRegistry,
}

impl Project {
    fn new(source: &str) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let root = Utf8Path::from_path(dir.path()).expect("UTF-8 temp path");
        let config = ProjectConfig::from_toml_str(source, root).expect("config parses");
        let registry = ModuleRegistry::from_config(&config).expect("registry builds");
        for module in registry.identifiers() {
            let classes = dir.path().join("classes").join(module.as_str());
            fs::create_dir_all(&classes).expect("create classes");
            let name = format!("com/example/{}/Main", module.package_token());
            fs::write(
                classes.join("Main.class"),
                ClassFileBuilder::new(&name).build(),
            )
            .expect("write class");
        }
        Self {
            dir,
            config,
            registry,
        }
    }

    fn plan(&self) -> Result<BuildPlan<'_>> {
        BuildPlan::prepare(&self.config, &self.registry)
    }
}

fn id(value: &str) -> ModuleId {
    ModuleId::try_from(value).expect("valid identifier")
}

#[fixture]
fn project() -> Project {
    Project::new(PROJECT)
}

#[rstest]
fn plans_every_module_with_manifest_dependencies(project: Project) {
    let plan = project.plan().expect("plans");

    let commands = plan.get(&id("commands")).expect("commands planned");
    assert_eq!(
        commands.manifest.dependencies,
        vec!["core", "permissions", "logging"]
    );
    assert_eq!(
        commands.output_path,
        project.dir.path().join("out/commands-1.0.0.jar")
    );
    let modules: Vec<_> = plan.modules().iter().map(|p| p.module().as_str()).collect();
    assert_eq!(modules, vec!["core", "logging", "permissions", "commands"]);
}

#[rstest]
fn assembles_selected_modules_in_order(project: Project) {
    let plan = project.plan().expect("plans");
    let selected = plan.select(&[]).expect("all modules");

    let artifacts = plan
        .assemble(&selected, &CancellationFlag::new())
        .expect("assembles");

    let modules: Vec<_> = artifacts.iter().map(|a| a.module.as_str()).collect();
    assert_eq!(modules, vec!["core", "logging", "permissions", "commands"]);
    for artifact in &artifacts {
        let names: Vec<_> = read_jar(&artifact.path).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names[0], "plugin.json");
        assert_eq!(names.len(), artifact.entries);
    }
}

#[rstest]
fn unknown_selection_is_rejected(project: Project) {
    let plan = project.plan().expect("plans");
    let err = plan
        .select(&["ghost".to_owned()])
        .expect_err("unknown module");
    assert!(matches!(err, PackagerError::UnknownModule { name } if name == "ghost"));
}

#[rstest]
fn with_closure_lists_target_first(project: Project) {
    let plan = project.plan().expect("plans");
    let modules: Vec<_> = plan
        .with_closure(&id("commands"))
        .expect("closure planned")
        .iter()
        .map(|p| p.module().as_str())
        .collect();
    assert_eq!(modules, vec!["commands", "core", "permissions", "logging"]);
}

#[rstest]
fn cancelled_build_writes_nothing(project: Project) {
    let plan = project.plan().expect("plans");
    let selected = plan.select(&[]).expect("all modules");
    let cancel = CancellationFlag::new();
    cancel.cancel();

    let err = plan.assemble(&selected, &cancel).expect_err("cancelled");

    assert!(matches!(err, PackagerError::Cancelled));
    assert!(!project.dir.path().join("out").exists());
}

#[rstest]
fn failing_module_is_reported_over_cancellations(project: Project) {
    fs::remove_dir_all(project.dir.path().join("classes/permissions")).expect("remove");
    let plan = project.plan().expect("plans");
    let selected = plan.select(&[]).expect("all modules");

    let err = plan
        .assemble(&selected, &CancellationFlag::new())
        .expect_err("missing output");

    assert!(matches!(
        err,
        PackagerError::Assembly(AssemblyError::MissingCompiledOutput { .. })
    ));
}

#[rstest]
fn failure_skips_modules_still_queued(project: Project) {
    fs::remove_dir_all(project.dir.path().join("classes/core")).expect("remove");
    let plan = project.plan().expect("plans");
    let selected = plan.select(&[]).expect("all modules");
    let cancel = CancellationFlag::new();

    let err = plan
        .assemble_on(&selected, &cancel, 1)
        .expect_err("missing output");

    assert!(matches!(
        err,
        PackagerError::Assembly(AssemblyError::MissingCompiledOutput { .. })
    ));
    assert!(cancel.is_cancelled());
    for module in ["logging", "permissions", "commands"] {
        let path = project.dir.path().join(format!("out/{module}-1.0.0.jar"));
        assert!(!path.exists(), "{module} should not have been assembled");
    }
}

#[rstest]
fn worker_count_does_not_change_artifact_order(project: Project) {
    let plan = project.plan().expect("plans");
    let selected = plan.select(&[]).expect("all modules");

    let artifacts = plan
        .assemble_on(&selected, &CancellationFlag::new(), 2)
        .expect("assembles");

    let modules: Vec<_> = artifacts.iter().map(|a| a.module.as_str()).collect();
    assert_eq!(modules, vec!["core", "logging", "permissions", "commands"]);
}

#[rstest]
fn relocation_collision_fails_before_any_write() {
    let project = Project::new(
        r#"
[project]
version = "1.0.0"
minimum_host_version = "146"
output_dir = "out"

[[modules]]
identifier = "a"
main = "com.example.a.A"
compiled_output = "classes/a"
relocate = [{ from = "org.lib", to = "com.example.shared" }]

[[modules]]
identifier = "b"
main = "com.example.b.B"
compiled_output = "classes/b"
relocate = [{ from = "org.lib", to = "com.example.shared" }]
"#,
    );

    let err = project.plan().expect_err("collision");

    assert!(matches!(
        err,
        PackagerError::Assembly(AssemblyError::RelocationCollision { .. })
    ));
    assert!(!project.dir.path().join("out").exists());
}

#[rstest]
fn cyclic_modules_fail_planning() {
    let project = Project::new(
        r#"
[project]
version = "1.0.0"
minimum_host_version = "146"

[[modules]]
identifier = "a"
main = "com.example.a.A"
dependencies = ["b"]

[[modules]]
identifier = "b"
main = "com.example.b.B"
dependencies = ["a"]
"#,
    );

    assert!(matches!(project.plan(), Err(PackagerError::Resolve(_))));
}

#[rstest]
fn missing_license_file_fails_planning() {
    let project = Project::new(&PROJECT.replace(
        "output_dir = \"out\"",
        "output_dir = \"out\"\nlicense = \"LICENSE.md\"",
    ));

    assert!(matches!(project.plan(), Err(PackagerError::License { .. })));
}

#[rstest]
fn fetch_requests_follow_configuration() {
    let config = ProjectConfig::from_toml_str(
        r#"
[project]
minimum_host_version = "146"

[[fetch]]
name = "server"
url = "https://example.test/v{version}/server.jar"
version = "146"
role = "host"
"#,
        Utf8Path::new("/work"),
    )
    .expect("config parses");

    let requests = fetch_requests(&config, Path::new("/cache"));

    assert_eq!(
        requests,
        vec![FetchRequest::new(
            "https://example.test/v146/server.jar",
            "146",
            "/cache/server"
        )]
    );
}

#[rstest]
fn second_host_asset_fails_before_downloading() {
    let mut config = ProjectConfig::from_toml_str(
        r#"
[project]
minimum_host_version = "146"

[[fetch]]
name = "server"
url = "https://example.test/v{version}/server.jar"
version = "146"
role = "host"
"#,
        Utf8Path::new("/work"),
    )
    .expect("config parses");
    let mut next = config.fetch[0].clone();
    next.name = "server-next".to_owned();
    config.fetch.push(next);
    let source = crate::fetch::download::MockRemoteSource::new();

    let err = fetch_assets(&source, &config, Path::new("/cache")).expect_err("two hosts");

    assert!(matches!(
        err,
        PackagerError::Config(distpack::ConfigError::DuplicateHostAsset { .. })
    ));
}

#[rstest]
fn host_instance_resolves_the_instance_directory() {
    let config = ProjectConfig::from_toml_str(
        "[project]\nminimum_host_version = \"146\"\n",
        Utf8Path::new("/work"),
    )
    .expect("config parses");

    let host = host_instance(&config, PathBuf::from("/cache/server/server.jar"));

    assert_eq!(host.instance_dir, PathBuf::from("/work/build/server"));
    assert_eq!(host.plugin_path(), PathBuf::from("/work/build/server/config/mods"));
    assert_eq!(host.java, "java");
}
