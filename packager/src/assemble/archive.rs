//! Reading assembly inputs and writing the output archive.

use super::AssemblyError;
use crate::fetch::cache::file_sha256;
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Where an input entry came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EntryOrigin {
    /// The module's own compiled output.
    Own,
    /// The library at this index of the module's library list.
    Library(usize),
}

/// One input file entry.
#[derive(Debug, Clone)]
pub(crate) struct SourcedEntry {
    pub(crate) name: String,
    pub(crate) data: Vec<u8>,
    pub(crate) origin: EntryOrigin,
}

/// Read a compiled-output directory or jar as `(path, contents)` pairs.
///
/// Directory contents are returned in sorted path order.
pub(crate) fn read_compiled_output(path: &Path) -> Result<Vec<(String, Vec<u8>)>, AssemblyError> {
    if path.is_dir() {
        let mut entries = Vec::new();
        walk_directory(path, "", &mut entries)?;
        Ok(entries)
    } else {
        read_jar(path)
    }
}

fn walk_directory(
    directory: &Path,
    prefix: &str,
    entries: &mut Vec<(String, Vec<u8>)>,
) -> Result<(), AssemblyError> {
    let mut children: Vec<_> = fs::read_dir(directory)
        .map_err(AssemblyError::io(directory))?
        .collect::<Result<_, _>>()
        .map_err(AssemblyError::io(directory))?;
    children.sort_by_key(fs::DirEntry::file_name);

    for child in children {
        let path = child.path();
        let Some(name) = child.file_name().to_str().map(ToOwned::to_owned) else {
            return Err(AssemblyError::ArchiveIntegrity {
                archive: path,
                reason: "file name is not valid UTF-8".to_owned(),
            });
        };
        let entry_name = format!("{prefix}{name}");
        if path.is_dir() {
            walk_directory(&path, &format!("{entry_name}/"), entries)?;
        } else {
            let data = fs::read(&path).map_err(AssemblyError::io(&path))?;
            entries.push((entry_name, data));
        }
    }
    Ok(())
}

/// Read every file entry of a jar, in archive order.
pub(crate) fn read_jar(path: &Path) -> Result<Vec<(String, Vec<u8>)>, AssemblyError> {
    let integrity = |reason: String| AssemblyError::ArchiveIntegrity {
        archive: path.to_path_buf(),
        reason,
    };
    let file = fs::File::open(path).map_err(AssemblyError::io(path))?;
    let mut archive = ZipArchive::new(file).map_err(|e| integrity(e.to_string()))?;

    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| integrity(e.to_string()))?;
        if entry.is_dir() {
            continue;
        }
        if entry.enclosed_name().is_none() {
            return Err(integrity(format!("unsafe entry path {}", entry.name())));
        }
        let name = entry.name().to_owned();
        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| integrity(format!("{name}: {e}")))?;
        entries.push((name, data));
    }
    Ok(entries)
}

/// Write `entries` to `output` atomically and return the archive digest.
///
/// The archive is written to a temporary file beside `output` and renamed
/// into place only after it has been completely written and synced.
/// Timestamps are fixed so identical inputs give identical archives.
pub(crate) fn write_archive(
    output: &Path,
    entries: &[(String, Vec<u8>)],
) -> Result<String, AssemblyError> {
    let directory = output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(directory).map_err(AssemblyError::io(directory))?;

    let write_error = |reason: String| AssemblyError::ArchiveWrite {
        path: output.to_path_buf(),
        reason,
    };
    let mut temp = NamedTempFile::new_in(directory).map_err(AssemblyError::io(directory))?;
    {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .last_modified_time(DateTime::default())
            .unix_permissions(0o644);
        let mut writer = ZipWriter::new(BufWriter::new(temp.as_file_mut()));
        for (name, data) in entries {
            writer
                .start_file(name.as_str(), options)
                .map_err(|e| write_error(e.to_string()))?;
            writer
                .write_all(data)
                .map_err(|e| write_error(e.to_string()))?;
        }
        let mut buffered = writer.finish().map_err(|e| write_error(e.to_string()))?;
        buffered.flush().map_err(|e| write_error(e.to_string()))?;
    }
    temp.as_file()
        .sync_all()
        .map_err(AssemblyError::io(temp.path()))?;
    temp.persist(output)
        .map_err(|e| AssemblyError::Io {
            path: output.to_path_buf(),
            source: e.error,
        })?;

    file_sha256(output).map_err(AssemblyError::io(output))
}

/// Whether an entry is a jar signature file.
pub(crate) fn is_signature_file(name: &str) -> bool {
    let Some(file) = name.strip_prefix("META-INF/") else {
        return false;
    };
    if file.contains('/') {
        return false;
    }
    let upper = file.to_ascii_uppercase();
    [".SF", ".DSA", ".RSA", ".EC"]
        .iter()
        .any(|suffix| upper.ends_with(suffix))
}

/// Whether an entry is a module descriptor, including multi-release ones.
pub(crate) fn is_module_descriptor(name: &str) -> bool {
    name == "module-info.class" || name.ends_with("/module-info.class")
}

/// Source path of an entry origin, for error reporting.
pub(crate) fn origin_path(
    origin: EntryOrigin,
    own_output: &Path,
    libraries: &[distpack::Library],
) -> PathBuf {
    match origin {
        EntryOrigin::Own => own_output.to_path_buf(),
        EntryOrigin::Library(index) => libraries
            .get(index)
            .map_or_else(|| own_output.to_path_buf(), |l| l.path.clone().into_std_path_buf()),
    }
}
