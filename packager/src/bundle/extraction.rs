//! Streaming extraction of localization files from a source archive.
//!
//! The archive is read entry by entry from a forward-only stream, so a
//! multi-megabyte source snapshot never has to be buffered or written to
//! disk as a whole. Only files whose archive path matches the configured
//! pattern are kept, and they are flattened to their base names.

use super::BundleError;
use regex::Regex;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

/// Extract matching file entries from `archive` into `destination`.
///
/// Returns the written paths in sorted order. Directory entries are skipped;
/// the copy of each file is bounded by the size the entry declares.
///
/// # Errors
///
/// Returns [`BundleError::ArchiveIntegrity`] if the stream is not a valid
/// zip archive, or [`BundleError::Io`] if writing fails.
pub fn extract_filtered(
    mut archive: impl Read,
    path_pattern: &Regex,
    destination: &Path,
) -> Result<BTreeSet<PathBuf>, BundleError> {
    fs::create_dir_all(destination).map_err(BundleError::io(destination))?;
    let mut written = BTreeSet::new();

    loop {
        let next = zip::read::read_zipfile_from_stream(&mut archive).map_err(|e| {
            BundleError::ArchiveIntegrity {
                reason: e.to_string(),
            }
        })?;
        let Some(mut entry) = next else {
            break;
        };
        if entry.is_dir() {
            continue;
        }

        let name = entry.name().to_owned();
        if !path_pattern.is_match(&name) {
            continue;
        }
        let Some(base_name) = base_name(&name) else {
            log::debug!("skipping archive entry without a usable file name: {name}");
            continue;
        };

        let target = destination.join(base_name);
        let size = entry.size();
        let file = fs::File::create(&target).map_err(BundleError::io(&target))?;
        let mut writer = BufWriter::new(file);
        let copied = io::copy(&mut (&mut entry).take(size), &mut writer)
            .map_err(BundleError::io(&target))?;
        writer.flush().map_err(BundleError::io(&target))?;
        if copied != size {
            return Err(BundleError::ArchiveIntegrity {
                reason: format!("{name}: expected {size} bytes, read {copied}"),
            });
        }
        log::debug!("extracted {name} ({size} bytes)");
        written.insert(target);
    }

    Ok(written)
}

fn base_name(entry_name: &str) -> Option<&str> {
    entry_name
        .rsplit('/')
        .next()
        .filter(|name| !name.is_empty() && *name != "." && *name != ".." && !name.contains('\\'))
}
