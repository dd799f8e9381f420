//! Behaviour-driven tests for dependency closure resolution.

use std::cell::RefCell;
use std::convert::Infallible;
use std::str::FromStr;

use distpack::registry::ModuleBuild;
use distpack::{ManifestDependencies, ModuleRegistry};
use distpack_common::{Module, ModuleId};
use distpack_packager::resolver::{
    DependencyOrigin, ResolveError, ResolvedDependencySet, resolve_closure,
};
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};

#[derive(Default)]
struct ResolverWorld {
    modules: RefCell<Vec<(String, Vec<String>)>>,
    logging: RefCell<Option<String>>,
    result: RefCell<Option<Result<ResolvedDependencySet, ResolveError>>>,
}

impl ResolverWorld {
    fn declare(&self, name: &str, dependencies: &[&str]) {
        self.modules.borrow_mut().push((
            name.to_owned(),
            dependencies.iter().map(|d| (*d).to_owned()).collect(),
        ));
    }

    fn registry(&self) -> ModuleRegistry {
        let mut registry = ModuleRegistry::new(self.logging.borrow().as_deref().map(id));
        for (name, dependencies) in self.modules.borrow().iter() {
            let module = Module::builder(id(name))
                .depends_on_all(dependencies.iter().map(|d| id(d)))
                .build()
                .unwrap_or_else(|err| panic!("invalid module {name}: {err}"));
            registry
                .register(module, ModuleBuild::default())
                .unwrap_or_else(|err| panic!("failed to register {name}: {err}"));
        }
        registry
    }

    fn with_closure<T>(&self, check: impl FnOnce(&ResolvedDependencySet) -> T) -> T {
        let borrow = self.result.borrow();
        match borrow.as_ref() {
            Some(Ok(closure)) => check(closure),
            Some(Err(error)) => panic!("expected resolution to succeed: {error}"),
            None => panic!("closure should be resolved"),
        }
    }
}

fn id(value: &str) -> ModuleId {
    ModuleId::try_from(value).unwrap_or_else(|err| panic!("invalid identifier {value}: {err}"))
}

fn joined(ids: impl IntoIterator<Item = ModuleId>) -> String {
    ids.into_iter()
        .map(ModuleId::into_inner)
        .collect::<Vec<_>>()
        .join(", ")
}

#[fixture]
fn resolver_world() -> ResolverWorld {
    ResolverWorld::default()
}

#[derive(Debug)]
struct QuotedText(String);

impl FromStr for QuotedText {
    type Err = Infallible;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input
            .trim()
            .trim_matches(|candidate| matches!(candidate, '"' | '\''));

        Ok(Self(trimmed.to_owned()))
    }
}

#[given(
    "modules core, logging, permissions depending on core and commands depending on core and permissions"
)]
fn plugin_modules(resolver_world: &ResolverWorld) {
    resolver_world.declare("core", &[]);
    resolver_world.declare("logging", &[]);
    resolver_world.declare("permissions", &["core"]);
    resolver_world.declare("commands", &["core", "permissions"]);
}

#[given(
    "modules core, logging, permissions depending on core and commands depending on permissions"
)]
fn layered_modules(resolver_world: &ResolverWorld) {
    resolver_world.declare("core", &[]);
    resolver_world.declare("logging", &[]);
    resolver_world.declare("permissions", &["core"]);
    resolver_world.declare("commands", &["permissions"]);
}

#[given("modules logging, core depending on logging and commands depending on core")]
fn logging_first_modules(resolver_world: &ResolverWorld) {
    resolver_world.declare("logging", &[]);
    resolver_world.declare("core", &["logging"]);
    resolver_world.declare("commands", &["core"]);
}

#[given("modules {first} and {second} that depend on each other")]
fn cyclic_modules(resolver_world: &ResolverWorld, first: QuotedText, second: QuotedText) {
    resolver_world.declare(&first.0, &[second.0.as_str()]);
    resolver_world.declare(&second.0, &[first.0.as_str()]);
}

#[given("{name} is the logging module")]
fn logging_module(resolver_world: &ResolverWorld, name: QuotedText) {
    resolver_world.logging.replace(Some(name.0));
}

#[when("the closure of {name} is resolved")]
fn resolve(resolver_world: &ResolverWorld, name: QuotedText) {
    let registry = resolver_world.registry();
    let outcome = resolve_closure(&id(&name.0), &registry);
    resolver_world.result.replace(Some(outcome));
}

#[then("the closure is {expected}")]
fn closure_is(resolver_world: &ResolverWorld, expected: QuotedText) {
    resolver_world.with_closure(|closure| {
        assert_eq!(joined(closure.ids().cloned()), expected.0);
    });
}

#[then("{name} entered the closure synthetically")]
fn synthetic_member(resolver_world: &ResolverWorld, name: QuotedText) {
    resolver_world.with_closure(|closure| {
        let member = closure
            .members()
            .iter()
            .find(|member| member.id.as_str() == name.0)
            .unwrap_or_else(|| panic!("{} is not in the closure", name.0));
        assert_eq!(member.origin, DependencyOrigin::Synthetic);
    });
}

#[then("direct manifest dependencies are {expected}")]
fn direct_dependencies(resolver_world: &ResolverWorld, expected: QuotedText) {
    resolver_world.with_closure(|closure| {
        assert_eq!(
            joined(closure.manifest_dependencies(ManifestDependencies::Direct)),
            expected.0
        );
    });
}

#[then("closure manifest dependencies are {expected}")]
fn closure_dependencies(resolver_world: &ResolverWorld, expected: QuotedText) {
    resolver_world.with_closure(|closure| {
        assert_eq!(
            joined(closure.manifest_dependencies(ManifestDependencies::Closure)),
            expected.0
        );
    });
}

#[then("resolution fails with a cycle {expected}")]
fn cycle_reported(resolver_world: &ResolverWorld, expected: QuotedText) {
    let borrow = resolver_world.result.borrow();
    match borrow.as_ref() {
        Some(Err(error @ ResolveError::CyclicDependency { .. })) => {
            assert!(
                error.to_string().contains(expected.0.as_str()),
                "expected '{error}' to name the cycle '{}'",
                expected.0
            );
        }
        Some(Err(other)) => panic!("expected a cycle but got {other}"),
        Some(Ok(closure)) => panic!("expected a cycle but resolved {closure:?}"),
        None => panic!("closure should be resolved"),
    }
}

#[scenario("tests/features/resolver.feature", index = 0)]
fn scenario_shared_dependencies(resolver_world: ResolverWorld) {
    let _ = resolver_world;
}

#[scenario("tests/features/resolver.feature", index = 1)]
fn scenario_cycle(resolver_world: ResolverWorld) {
    let _ = resolver_world;
}

#[scenario("tests/features/resolver.feature", index = 2)]
fn scenario_manifest_modes(resolver_world: ResolverWorld) {
    let _ = resolver_world;
}

#[scenario("tests/features/resolver.feature", index = 3)]
fn scenario_transitive_logging(resolver_world: ResolverWorld) {
    let _ = resolver_world;
}
