//! Platform directory lookup.

use std::path::PathBuf;

/// Name of the cache subdirectory owned by distpack.
const CACHE_SUBDIR: &str = "distpack";

/// Source of platform base directories.
#[cfg_attr(test, mockall::automock)]
pub trait BaseDirs {
    /// The user's cache directory, if the platform defines one.
    fn cache_dir(&self) -> Option<PathBuf>;
}

/// Base directories of the current user, via `directories-next`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBaseDirs;

impl BaseDirs for SystemBaseDirs {
    fn cache_dir(&self) -> Option<PathBuf> {
        directories_next::BaseDirs::new().map(|dirs| dirs.cache_dir().to_path_buf())
    }
}

/// The fetch cache directory: `<cache>/distpack`.
#[must_use]
pub fn default_cache_dir(dirs: &dyn BaseDirs) -> Option<PathBuf> {
    dirs.cache_dir().map(|dir| dir.join(CACHE_SUBDIR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn cache_dir_is_namespaced() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_cache_dir()
            .return_once(|| Some(PathBuf::from("/home/user/.cache")));

        assert_eq!(
            default_cache_dir(&dirs),
            Some(PathBuf::from("/home/user/.cache/distpack"))
        );
    }

    #[rstest]
    fn missing_platform_cache_gives_none() {
        let mut dirs = MockBaseDirs::new();
        dirs.expect_cache_dir().return_once(|| None);

        assert_eq!(default_cache_dir(&dirs), None);
    }
}
