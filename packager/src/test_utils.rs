//! Archive and class-file fixtures for tests.
//!
//! Available to unit tests and, through the `test-support` feature, to the
//! behaviour suites under `tests/`.

use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Build an in-memory zip archive from `(path, contents)` pairs.
///
/// # Panics
///
/// Panics if the archive cannot be written.
#[must_use]
pub fn jar_bytes(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        writer
            .start_file(*name, SimpleFileOptions::default())
            .expect("start fixture entry");
        writer.write_all(contents).expect("write fixture entry");
    }
    writer.finish().expect("finish fixture archive").into_inner()
}

/// Write a zip archive to `path`.
///
/// # Panics
///
/// Panics if the file cannot be written.
pub fn write_jar(path: &Path, entries: &[(&str, &[u8])]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("create fixture directory");
    }
    std::fs::write(path, jar_bytes(entries)).expect("write fixture archive");
}

/// Read every file entry of the archive at `path`, in archive order.
///
/// # Panics
///
/// Panics if the archive cannot be read.
#[must_use]
pub fn read_jar(path: &Path) -> Vec<(String, Vec<u8>)> {
    let file = std::fs::File::open(path).expect("open archive");
    let mut archive = ZipArchive::new(file).expect("read archive");
    let mut entries = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).expect("read archive entry");
        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).expect("read entry contents");
        entries.push((entry.name().to_owned(), contents));
    }
    entries
}

/// Builder for minimal, structurally valid class files.
///
/// The produced class has an empty body; only the constant pool and the
/// class header are populated, which is all relocation and minimization
/// inspect.
#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    name: String,
    references: Vec<String>,
    strings: Vec<String>,
    with_long: bool,
}

impl ClassFileBuilder {
    /// Start a class with the given internal name, such as `com/example/Core`.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            references: Vec::new(),
            strings: Vec::new(),
            with_long: false,
        }
    }

    /// Add a class reference constant.
    #[must_use]
    pub fn reference(mut self, internal_name: &str) -> Self {
        self.references.push(internal_name.to_owned());
        self
    }

    /// Add a string literal constant, such as a descriptor or a class name
    /// used reflectively.
    #[must_use]
    pub fn string(mut self, text: &str) -> Self {
        self.strings.push(text.to_owned());
        self
    }

    /// Add a long constant, which occupies two pool slots.
    #[must_use]
    pub fn with_long(mut self) -> Self {
        self.with_long = true;
        self
    }

    /// Encode the class file.
    ///
    /// # Panics
    ///
    /// Panics if a name exceeds the constant pool's length limit.
    #[must_use]
    pub fn build(&self) -> Vec<u8> {
        let mut pool = PoolWriter::default();
        if self.with_long {
            pool.long(0x0123_4567_89ab_cdef);
        }
        let this_class = pool.class(&self.name);
        let super_class = pool.class("java/lang/Object");
        for reference in &self.references {
            pool.class(reference);
        }
        for text in &self.strings {
            pool.string(text);
        }

        let mut out = Vec::new();
        out.extend_from_slice(&0xCAFE_BABE_u32.to_be_bytes());
        out.extend_from_slice(&0_u16.to_be_bytes());
        out.extend_from_slice(&52_u16.to_be_bytes());
        out.extend_from_slice(&pool.next_index.to_be_bytes());
        out.extend_from_slice(&pool.bytes);
        out.extend_from_slice(&0x0021_u16.to_be_bytes());
        out.extend_from_slice(&this_class.to_be_bytes());
        out.extend_from_slice(&super_class.to_be_bytes());
        // interfaces, fields, methods, attributes
        out.extend_from_slice(&[0, 0, 0, 0, 0, 0, 0, 0]);
        out
    }
}

struct PoolWriter {
    bytes: Vec<u8>,
    next_index: u16,
}

impl Default for PoolWriter {
    fn default() -> Self {
        Self {
            bytes: Vec::new(),
            next_index: 1,
        }
    }
}

impl PoolWriter {
    fn utf8(&mut self, text: &str) -> u16 {
        let length = u16::try_from(text.len()).expect("fixture string fits in a u16");
        self.bytes.push(1);
        self.bytes.extend_from_slice(&length.to_be_bytes());
        self.bytes.extend_from_slice(text.as_bytes());
        self.take_index(1)
    }

    fn class(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.bytes.push(7);
        self.bytes.extend_from_slice(&name_index.to_be_bytes());
        self.take_index(1)
    }

    fn string(&mut self, text: &str) -> u16 {
        let utf8_index = self.utf8(text);
        self.bytes.push(8);
        self.bytes.extend_from_slice(&utf8_index.to_be_bytes());
        self.take_index(1)
    }

    fn long(&mut self, value: u64) -> u16 {
        self.bytes.push(5);
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self.take_index(2)
    }

    fn take_index(&mut self, slots: u16) -> u16 {
        let index = self.next_index;
        self.next_index += slots;
        index
    }
}
