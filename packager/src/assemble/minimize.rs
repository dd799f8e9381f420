//! Removal of library classes the module cannot reach.
//!
//! Reachability starts from every class the module compiles itself, every
//! class of a whitelisted library and every service provider named in a
//! registration file. References are followed through class constant pools;
//! library classes never reached are dropped. Non-class resources are always
//! kept.

use super::AssemblyError;
use super::archive::{EntryOrigin, SourcedEntry};
use super::classfile::ConstantPool;
use super::service_files::is_service_file;
use regex::Regex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::PathBuf;

const CLASS_SUFFIX: &str = ".class";

/// Library coordinates excluded from minimization.
#[derive(Debug, Default)]
pub struct KeepList {
    patterns: Vec<Regex>,
}

impl KeepList {
    /// Compile keep patterns, where `*` matches any run of characters.
    ///
    /// # Errors
    ///
    /// Returns [`AssemblyError::InvalidKeepPattern`] if a pattern does not
    /// compile.
    pub fn new(patterns: &[String]) -> Result<Self, AssemblyError> {
        let patterns = patterns
            .iter()
            .map(|pattern| {
                let body = pattern
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");
                Regex::new(&format!("^{body}$")).map_err(|source| {
                    AssemblyError::InvalidKeepPattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether a library coordinate is kept whole.
    #[must_use]
    pub fn keeps(&self, coordinate: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(coordinate))
    }
}

/// Indices into `entries` of library classes that are unreachable.
///
/// `coordinates` holds each library's coordinate, indexed as in
/// [`EntryOrigin::Library`]; `source_of` names the archive an entry came
/// from for error reports.
pub(crate) fn unreachable_library_classes(
    entries: &[SourcedEntry],
    coordinates: &[&str],
    keep: &KeepList,
    source_of: impl Fn(EntryOrigin) -> PathBuf,
) -> Result<HashSet<usize>, AssemblyError> {
    let mut class_index: HashMap<&str, usize> = HashMap::new();
    for (index, entry) in entries.iter().enumerate() {
        if let Some(name) = entry.name.strip_suffix(CLASS_SUFFIX) {
            class_index.entry(name).or_insert(index);
        }
    }

    let kept_library = |origin: EntryOrigin| match origin {
        EntryOrigin::Own => true,
        EntryOrigin::Library(i) => coordinates.get(i).is_some_and(|c| keep.keeps(c)),
    };

    let mut queue: VecDeque<usize> = class_index
        .values()
        .copied()
        .filter(|&i| entries.get(i).is_some_and(|e| kept_library(e.origin)))
        .collect();
    for entry in entries.iter().filter(|e| is_service_file(&e.name)) {
        for line in String::from_utf8_lossy(&entry.data).lines() {
            let provider = line.split('#').next().unwrap_or_default().trim();
            if let Some(&index) = class_index.get(provider.replace('.', "/").as_str()) {
                queue.push_back(index);
            }
        }
    }

    let mut reached: HashSet<usize> = queue.iter().copied().collect();
    while let Some(index) = queue.pop_front() {
        let Some(entry) = entries.get(index) else {
            continue;
        };
        let pool = ConstantPool::parse(&entry.data).map_err(|e| AssemblyError::ArchiveIntegrity {
            archive: source_of(entry.origin),
            reason: format!("{}: {e}", entry.name),
        })?;
        for name in pool.referenced_classes() {
            if let Some(&target) = class_index.get(name.as_str()) {
                if reached.insert(target) {
                    queue.push_back(target);
                }
            }
        }
    }

    Ok(class_index
        .values()
        .copied()
        .filter(|i| !reached.contains(i))
        .filter(|&i| {
            entries
                .get(i)
                .is_some_and(|e| matches!(e.origin, EntryOrigin::Library(_)))
        })
        .collect())
}
