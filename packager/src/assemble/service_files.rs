//! Service registration file merging.
//!
//! Libraries register providers in `META-INF/services/<capability>` files,
//! one provider class name per line. When several inputs carry the same file
//! the merged archive holds the union of their providers in first-seen
//! order, so no library's registration silently replaces another's.

use std::collections::{HashMap, HashSet};

/// Directory holding service registration files.
pub const SERVICES_DIR: &str = "META-INF/services/";

/// Whether an entry path is a service registration file.
#[must_use]
pub fn is_service_file(path: &str) -> bool {
    path.strip_prefix(SERVICES_DIR)
        .is_some_and(|name| !name.is_empty() && !name.contains('/'))
}

#[derive(Debug, Default)]
struct ServiceFile {
    providers: Vec<String>,
    seen: HashSet<String>,
}

/// Accumulates service files across inputs.
#[derive(Debug, Default)]
pub struct ServiceFileMerger {
    files: Vec<(String, ServiceFile)>,
    index: HashMap<String, usize>,
}

impl ServiceFileMerger {
    /// Create an empty merger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the contents of one service file.
    ///
    /// Comments after `#`, surrounding whitespace and blank lines are
    /// dropped; providers already present are skipped.
    pub fn add(&mut self, path: &str, contents: &str) {
        let position = match self.index.get(path) {
            Some(&position) => position,
            None => {
                self.index.insert(path.to_owned(), self.files.len());
                self.files.push((path.to_owned(), ServiceFile::default()));
                self.files.len() - 1
            }
        };
        let Some((_, file)) = self.files.get_mut(position) else {
            return;
        };
        for line in contents.lines() {
            let provider = line.split('#').next().unwrap_or_default().trim();
            if provider.is_empty() || file.seen.contains(provider) {
                continue;
            }
            file.seen.insert(provider.to_owned());
            file.providers.push(provider.to_owned());
        }
    }

    /// Whether no service file was added.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The merged files as `(path, contents)` in first-seen order.
    #[must_use]
    pub fn into_entries(self) -> Vec<(String, Vec<u8>)> {
        self.files
            .into_iter()
            .map(|(path, file)| {
                let mut contents = file.providers.join("\n");
                if !contents.is_empty() {
                    contents.push('\n');
                }
                (path, contents.into_bytes())
            })
            .collect()
    }
}
