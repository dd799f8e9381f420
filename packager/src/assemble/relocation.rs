//! Package relocation.
//!
//! A [`RelocationMap`] moves third-party package roots under a
//! module-private namespace so that two modules bundling the same library
//! at different versions do not collide inside one host. Rewriting is a
//! single left-to-right pass over the bytes, matching the slash form
//! (`org/lib/`) used by class files and entry paths and the dot form
//! (`org.lib.`) used by service files and reflective strings.
//!
//! A [`RelocationLedger`] spans one build and rejects two modules claiming
//! the same target root.

use super::AssemblyError;
use distpack::config::RelocationSpec;
use distpack_common::{Module, ModuleId};
use regex::Regex;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::LazyLock;

#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal and compiles on every build"
)]
static PACKAGE_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
        .expect("package name pattern is valid")
});

/// One source root and its target root, both in dot form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelocationRule {
    /// Original package root.
    pub source: String,
    /// Replacement package root.
    pub target: String,
}

#[derive(Debug, Clone)]
struct Pattern {
    separator: u8,
    from: Vec<u8>,
    to: Vec<u8>,
}

/// The relocation rules of one module.
#[derive(Debug, Clone, Default)]
pub struct RelocationMap {
    rules: Vec<RelocationRule>,
    patterns: Vec<Pattern>,
}

impl RelocationMap {
    /// Build a map from explicit rules.
    ///
    /// Longer source roots take precedence over shorter ones.
    #[must_use]
    pub fn new(rules: Vec<RelocationRule>) -> Self {
        let mut patterns: Vec<Pattern> = rules
            .iter()
            .flat_map(|rule| {
                [b'/', b'.'].map(|separator| Pattern {
                    separator,
                    from: with_separator(&rule.source, separator),
                    to: with_separator(&rule.target, separator),
                })
            })
            .collect();
        patterns.sort_by(|a, b| b.from.len().cmp(&a.from.len()));
        Self { rules, patterns }
    }

    /// Build the map for `module` from its configured specs.
    ///
    /// Bare roots relocate to `{prefix}.{module token}.{leaf}`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::InvalidRelocation`] for malformed package
    /// names, or [`AssemblyError::RelocationCollision`] when a root overlaps
    /// the module's own package or two rules share a source or target.
    ///
    /// # Examples
    ///
    /// ```
    /// use distpack::config::RelocationSpec;
    /// use distpack_common::{Module, ModuleId};
    /// use distpack_packager::assemble::relocation::RelocationMap;
    ///
    /// let module = Module::builder(ModuleId::try_from("distributor-core").expect("valid"))
    ///     .build()
    ///     .expect("valid module");
    /// let map = RelocationMap::for_module(
    ///     &module,
    ///     &[RelocationSpec::Root("org.spongepowered.configurate".to_owned())],
    ///     "com.xpdustry.shadow",
    /// )
    /// .expect("valid rules");
    /// assert_eq!(
    ///     map.relocate_str("org/spongepowered/configurate/Node.class"),
    ///     "com/xpdustry/shadow/distributor_core/configurate/Node.class"
    /// );
    /// ```
    pub fn for_module(
        module: &Module,
        specs: &[RelocationSpec],
        prefix: &str,
    ) -> Result<Self, AssemblyError> {
        let identifier = module.identifier();
        let token = identifier.package_token();
        let mut rules: Vec<RelocationRule> = Vec::with_capacity(specs.len());

        for spec in specs {
            let rule = match spec {
                RelocationSpec::Root(root) => RelocationRule {
                    source: root.clone(),
                    target: default_target(prefix, &token, root),
                },
                RelocationSpec::Explicit { from, to } => RelocationRule {
                    source: from.clone(),
                    target: to.clone(),
                },
            };
            validate_name(identifier, &rule.source)?;
            validate_name(identifier, &rule.target)?;

            if let Some(own) = module.source_package() {
                if overlaps(own, &rule.source) {
                    return Err(AssemblyError::RelocationCollision {
                        module: identifier.clone(),
                        root: rule.source,
                        reason: format!("overlaps the module's own package {own}"),
                    });
                }
            }
            if let Some(existing) = rules
                .iter()
                .find(|r| r.source == rule.source || r.target == rule.target)
            {
                return Err(AssemblyError::RelocationCollision {
                    module: identifier.clone(),
                    root: rule.source.clone(),
                    reason: format!(
                        "conflicts with {} -> {} in the same module",
                        existing.source, existing.target
                    ),
                });
            }
            rules.push(rule);
        }

        Ok(Self::new(rules))
    }

    /// The rules in configuration order.
    #[must_use]
    pub fn rules(&self) -> &[RelocationRule] {
        &self.rules
    }

    /// Whether the map has no rules.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rewrite every occurrence of a source root in `input`.
    ///
    /// Returns `None` when nothing matched.
    #[must_use]
    pub fn relocate_bytes(&self, input: &[u8]) -> Option<Vec<u8>> {
        if self.patterns.is_empty() {
            return None;
        }
        let mut out = Vec::with_capacity(input.len());
        let mut changed = false;
        let mut position = 0;
        while let Some(&byte) = input.get(position) {
            match self.match_at(input, position) {
                Some(found) => {
                    out.extend_from_slice(found.replacement);
                    position += found.consumed;
                    changed = true;
                }
                None => {
                    out.push(byte);
                    position += 1;
                }
            }
        }
        changed.then_some(out)
    }

    /// Rewrite a path or text value.
    #[must_use]
    pub fn relocate_str<'a>(&self, input: &'a str) -> Cow<'a, str> {
        match self.relocate_bytes(input.as_bytes()).map(String::from_utf8) {
            Some(Ok(text)) => Cow::Owned(text),
            _ => Cow::Borrowed(input),
        }
    }

    fn match_at(&self, input: &[u8], position: usize) -> Option<Match<'_>> {
        let rest = input.get(position..)?;
        self.patterns.iter().find_map(|pattern| {
            if !starts_name(input, position, pattern.separator) {
                return None;
            }
            if rest.starts_with(&pattern.from) {
                return Some(Match {
                    consumed: pattern.from.len(),
                    replacement: &pattern.to,
                });
            }
            // The bare root at the end of the input, such as a package name.
            let (_, from_root) = pattern.from.split_last()?;
            let (_, to_root) = pattern.to.split_last()?;
            (rest == from_root).then_some(Match {
                consumed: from_root.len(),
                replacement: to_root,
            })
        })
    }
}

struct Match<'a> {
    consumed: usize,
    replacement: &'a [u8],
}

/// Whether a qualified name using `separator` may start at `position`.
///
/// A name starts at the beginning of the input, after a non-name byte, or
/// after the `L` that opens an object type in a descriptor. A slash ends a
/// path segment, so dotted names may start right after one, as in
/// `META-INF/services/org.lib.Spi`.
fn starts_name(input: &[u8], position: usize, separator: u8) -> bool {
    let Some(&previous) = position.checked_sub(1).and_then(|p| input.get(p)) else {
        return true;
    };
    let in_name = previous.is_ascii_alphanumeric()
        || matches!(previous, b'_' | b'$' | b'.')
        || (previous == b'/' && separator == b'/');
    previous == b'L' || !in_name
}

fn with_separator(root: &str, separator: u8) -> Vec<u8> {
    let mut bytes: Vec<u8> = root
        .bytes()
        .map(|b| if b == b'.' { separator } else { b })
        .collect();
    bytes.push(separator);
    bytes
}

fn default_target(prefix: &str, token: &str, root: &str) -> String {
    let leaf = root.rsplit('.').next().unwrap_or(root);
    format!("{prefix}.{token}.{leaf}")
}

fn validate_name(module: &ModuleId, name: &str) -> Result<(), AssemblyError> {
    if PACKAGE_NAME.is_match(name) {
        Ok(())
    } else {
        Err(AssemblyError::InvalidRelocation {
            module: module.clone(),
            root: name.to_owned(),
        })
    }
}

fn overlaps(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    };
    nested(a, b) || nested(b, a)
}

/// Build-wide record of relocation targets.
#[derive(Debug, Default)]
pub struct RelocationLedger {
    targets: HashMap<String, (ModuleId, String)>,
}

impl RelocationLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every rule of `module`.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::RelocationCollision`] if another module
    /// already relocates into one of the same target roots.
    pub fn record(&mut self, module: &ModuleId, map: &RelocationMap) -> Result<(), AssemblyError> {
        for rule in map.rules() {
            if let Some((owner, source)) = self.targets.get(&rule.target) {
                if owner != module {
                    return Err(AssemblyError::RelocationCollision {
                        module: module.clone(),
                        root: rule.source.clone(),
                        reason: format!(
                            "target {} is already used by {owner} for {source}",
                            rule.target
                        ),
                    });
                }
            }
            self.targets
                .insert(rule.target.clone(), (module.clone(), rule.source.clone()));
        }
        Ok(())
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
    fn map() -> RelocationMap {
        RelocationMap::new(vec![
            RelocationRule {
                source: "org.lib".to_owned(),
                target: "shadow.core.lib".to_owned(),
            },
            RelocationRule {
                source: "org.lib.extra".to_owned(),
                target: "shadow.core.extra".to_owned(),
            },
        ])
    }

    #[rstest]
    #[case::class_path("org/lib/Util.class", "shadow/core/lib/Util.class")]
    #[case::longest_root_wins("org/lib/extra/Thing.class", "shadow/core/extra/Thing.class")]
    #[case::descriptor("(ILorg/lib/Util;)V", "(ILshadow/core/lib/Util;)V")]
    #[case::array_descriptor("[Lorg/lib/Util;", "[Lshadow/core/lib/Util;")]
    #[case::dotted("org.lib.Util", "shadow.core.lib.Util")]
    #[case::service_name("META-INF/services/org.lib.Spi", "META-INF/services/shadow.core.lib.Spi")]
    #[case::package_name("org.lib", "shadow.core.lib")]
    #[case::unrelated("com/example/Core", "com/example/Core")]
    #[case::nested_package("com/org/lib/Util", "com/org/lib/Util")]
    #[case::nested_dotted_package("com.org.lib.Util", "com.org.lib.Util")]
    #[case::dotted_after_path("config/org.lib.Settings", "config/shadow.core.lib.Settings")]
    #[case::prefix_of_longer_name("org/library/Util", "org/library/Util")]
    fn relocates_both_forms(map: RelocationMap, #[case] input: &str, #[case] expected: &str) {
        assert_eq!(map.relocate_str(input), expected);
    }

    #[rstest]
    fn unchanged_input_reports_none(map: RelocationMap) {
        assert_eq!(map.relocate_bytes(b"java/lang/Object"), None);
    }

    fn module(source_package: Option<&str>) -> Module {
        let mut builder = Module::builder(id("distributor-core"));
        if let Some(package) = source_package {
            builder = builder.source_package(package);
        }
        builder.build().expect("valid module")
    }

    #[rstest]
    fn bare_roots_get_module_private_targets() {
        let map = RelocationMap::for_module(
            &module(None),
            &[RelocationSpec::Root("io.leangen.geantyref".to_owned())],
            "distpack.shadow",
        )
        .expect("valid rules");
        assert_eq!(
            map.rules(),
            &[RelocationRule {
                source: "io.leangen.geantyref".to_owned(),
                target: "distpack.shadow.distributor_core.geantyref".to_owned(),
            }]
        );
    }

    #[rstest]
    #[case::equal("com.xpdustry.distributor")]
    #[case::inside("com.xpdustry.distributor.core")]
    #[case::outside("com.xpdustry")]
    fn roots_overlapping_own_package_collide(#[case] root: &str) {
        let err = RelocationMap::for_module(
            &module(Some("com.xpdustry.distributor")),
            &[RelocationSpec::Root(root.to_owned())],
            "distpack.shadow",
        )
        .expect_err("overlap rejected");
        assert!(matches!(err, AssemblyError::RelocationCollision { .. }));
    }

    #[rstest]
    fn sibling_package_does_not_overlap() {
        let map = RelocationMap::for_module(
            &module(Some("com.xpdustry.distributor")),
            &[RelocationSpec::Root("com.xpdustry.distributorx".to_owned())],
            "distpack.shadow",
        );
        assert!(map.is_ok());
    }

    #[rstest]
    fn rules_sharing_a_target_collide() {
        let err = RelocationMap::for_module(
            &module(None),
            &[
                RelocationSpec::Root("org.a.util".to_owned()),
                RelocationSpec::Root("org.b.util".to_owned()),
            ],
            "distpack.shadow",
        )
        .expect_err("same derived target");
        assert!(matches!(err, AssemblyError::RelocationCollision { .. }));
    }

    #[rstest]
    #[case::empty("")]
    #[case::slashes("org/lib")]
    #[case::trailing_dot("org.lib.")]
    fn malformed_roots_are_rejected(#[case] root: &str) {
        let err = RelocationMap::for_module(
            &module(None),
            &[RelocationSpec::Root(root.to_owned())],
            "distpack.shadow",
        )
        .expect_err("malformed root");
        assert!(matches!(err, AssemblyError::InvalidRelocation { .. }));
    }

    fn explicit(from: &str, to: &str) -> RelocationMap {
        RelocationMap::new(vec![RelocationRule {
            source: from.to_owned(),
            target: to.to_owned(),
        }])
    }

    #[rstest]
    fn ledger_rejects_two_modules_with_the_same_target() {
        let mut ledger = RelocationLedger::new();
        let shared = explicit("org.lib", "shared.lib");
        ledger.record(&id("core"), &shared).expect("first claim");

        let err = ledger
            .record(&id("commands"), &shared)
            .expect_err("second module collides");

        assert!(matches!(err, AssemblyError::RelocationCollision { .. }));
    }

    #[rstest]
    fn ledger_accepts_distinct_targets_for_the_same_library() {
        let mut ledger = RelocationLedger::new();
        ledger
            .record(&id("core"), &explicit("org.lib", "shadow.core.lib"))
            .expect("core claim");
        ledger
            .record(&id("commands"), &explicit("org.lib", "shadow.commands.lib"))
            .expect("commands claim");
    }
}
