//! Class-file constant pool access.
//!
//! Relocation and minimization only need the constant pool and the class
//! header. The pool is parsed into spans over the original bytes; rewriting
//! replaces UTF-8 entries and copies everything else verbatim.

use regex::bytes::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;
use thiserror::Error;

const MAGIC: u32 = 0xCAFE_BABE;

/// Offset of the constant pool count.
const POOL_COUNT_OFFSET: usize = 8;

/// Errors raised while reading a class file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassFileError {
    /// The file does not start with the class-file magic number.
    #[error("not a class file")]
    BadMagic,

    /// The file ends inside a structure.
    #[error("truncated at offset {offset}")]
    Truncated {
        /// Offset of the failed read.
        offset: usize,
    },

    /// A constant pool entry has an unknown tag.
    #[error("unknown constant pool tag {tag} at index {index}")]
    UnknownTag {
        /// The tag byte.
        tag: u8,
        /// Pool index of the entry.
        index: usize,
    },

    /// An index does not refer to the expected kind of constant.
    #[error("constant pool index {index} is not a valid {expected} entry")]
    BadIndex {
        /// The offending index.
        index: u16,
        /// Expected constant kind.
        expected: &'static str,
    },

    /// A rewritten string no longer fits in a UTF-8 constant.
    #[error("rewritten constant is {length} bytes, longer than 65535")]
    Utf8TooLong {
        /// Length of the rewritten bytes.
        length: usize,
    },
}

#[derive(Debug, Clone, Copy)]
enum Constant {
    Utf8 { start: usize, end: usize },
    Class { name_index: u16 },
    Other,
    Unusable,
}

/// A parsed constant pool borrowing the class bytes.
#[derive(Debug)]
pub struct ConstantPool<'a> {
    bytes: &'a [u8],
    entries: Vec<Constant>,
    end: usize,
}

struct Reader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl Reader<'_> {
    fn u8(&mut self) -> Result<u8, ClassFileError> {
        let value = *self
            .bytes
            .get(self.position)
            .ok_or(ClassFileError::Truncated {
                offset: self.position,
            })?;
        self.position += 1;
        Ok(value)
    }

    fn u16(&mut self) -> Result<u16, ClassFileError> {
        Ok(u16::from_be_bytes([self.u8()?, self.u8()?]))
    }

    fn skip(&mut self, count: usize) -> Result<(), ClassFileError> {
        let target = self.position + count;
        if target > self.bytes.len() {
            return Err(ClassFileError::Truncated {
                offset: self.bytes.len(),
            });
        }
        self.position = target;
        Ok(())
    }
}

impl<'a> ConstantPool<'a> {
    /// Parse the constant pool of `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassFileError`] if the bytes are not a well-formed class
    /// file up to the end of the constant pool.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ClassFileError> {
        let mut reader = Reader { bytes, position: 0 };
        let magic = u32::from_be_bytes([reader.u8()?, reader.u8()?, reader.u8()?, reader.u8()?]);
        if magic != MAGIC {
            return Err(ClassFileError::BadMagic);
        }
        reader.skip(POOL_COUNT_OFFSET - 4)?;
        let count = usize::from(reader.u16()?);

        let mut entries = vec![Constant::Unusable];
        while entries.len() < count {
            let index = entries.len();
            let tag = reader.u8()?;
            match tag {
                1 => {
                    let length = usize::from(reader.u16()?);
                    let start = reader.position;
                    reader.skip(length)?;
                    entries.push(Constant::Utf8 {
                        start,
                        end: reader.position,
                    });
                }
                7 => {
                    let name_index = reader.u16()?;
                    entries.push(Constant::Class { name_index });
                }
                5 | 6 => {
                    reader.skip(8)?;
                    entries.push(Constant::Other);
                    entries.push(Constant::Unusable);
                }
                3 | 4 | 9 | 10 | 11 | 12 | 17 | 18 => {
                    reader.skip(4)?;
                    entries.push(Constant::Other);
                }
                8 | 16 | 19 | 20 => {
                    reader.skip(2)?;
                    entries.push(Constant::Other);
                }
                15 => {
                    reader.skip(3)?;
                    entries.push(Constant::Other);
                }
                _ => return Err(ClassFileError::UnknownTag { tag, index }),
            }
        }

        Ok(Self {
            bytes,
            entries,
            end: reader.position,
        })
    }

    fn utf8(&self, index: u16) -> Result<&'a [u8], ClassFileError> {
        match self.entries.get(usize::from(index)) {
            Some(&Constant::Utf8 { start, end }) => self
                .bytes
                .get(start..end)
                .ok_or(ClassFileError::Truncated { offset: start }),
            _ => Err(ClassFileError::BadIndex {
                index,
                expected: "UTF-8",
            }),
        }
    }

    fn class_name_at(&self, index: u16) -> Result<&'a [u8], ClassFileError> {
        match self.entries.get(usize::from(index)) {
            Some(Constant::Class { name_index }) => self.utf8(*name_index),
            _ => Err(ClassFileError::BadIndex {
                index,
                expected: "class",
            }),
        }
    }

    /// Internal name of the class itself, such as `com/example/Core`.
    ///
    /// # Errors
    ///
    /// Returns [`ClassFileError`] if the header is truncated or points at a
    /// non-class constant.
    pub fn this_class(&self) -> Result<String, ClassFileError> {
        let mut reader = Reader {
            bytes: self.bytes,
            position: self.end,
        };
        reader.skip(2)?;
        let index = reader.u16()?;
        Ok(String::from_utf8_lossy(self.class_name_at(index)?).into_owned())
    }

    /// Internal names of every class the pool refers to.
    ///
    /// Includes class constants (array element types unwrapped), object
    /// types inside descriptors and signatures, and string constants shaped
    /// like dotted class names, which usually indicate reflective loading.
    #[must_use]
    pub fn referenced_classes(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for entry in &self.entries {
            match *entry {
                Constant::Class { name_index } => {
                    let Ok(name) = self.utf8(name_index) else {
                        continue;
                    };
                    if name.first() == Some(&b'[') {
                        collect_descriptor_types(name, &mut names);
                    } else {
                        names.insert(String::from_utf8_lossy(name).into_owned());
                    }
                }
                Constant::Utf8 { start, end } => {
                    let Some(text) = self.bytes.get(start..end) else {
                        continue;
                    };
                    collect_descriptor_types(text, &mut names);
                    if DOTTED_NAME.is_match(text) {
                        names.insert(String::from_utf8_lossy(text).replace('.', "/"));
                    }
                }
                Constant::Other | Constant::Unusable => {}
            }
        }
        names
    }
}

#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal and compiles on every build"
)]
static DESCRIPTOR_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"L([A-Za-z0-9_$/]+)[;<]").expect("descriptor type pattern is valid")
});

#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal and compiles on every build"
)]
static DOTTED_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)+$")
        .expect("dotted name pattern is valid")
});

fn collect_descriptor_types(text: &[u8], names: &mut BTreeSet<String>) {
    for capture in DESCRIPTOR_TYPE.captures_iter(text) {
        if let Some(name) = capture.get(1) {
            names.insert(String::from_utf8_lossy(name.as_bytes()).into_owned());
        }
    }
}

/// Rewrite every UTF-8 constant through `rewrite`.
///
/// `rewrite` returns `None` to keep an entry unchanged. Returns `None` when
/// no entry changed.
///
/// # Errors
///
/// Returns [`ClassFileError`] if the class cannot be parsed or a rewritten
/// entry exceeds the UTF-8 constant length limit.
pub fn rewrite_utf8(
    bytes: &[u8],
    mut rewrite: impl FnMut(&[u8]) -> Option<Vec<u8>>,
) -> Result<Option<Vec<u8>>, ClassFileError> {
    let pool = ConstantPool::parse(bytes)?;
    let mut out = Vec::with_capacity(bytes.len());
    let mut copied_to = 0;

    for entry in &pool.entries {
        let Constant::Utf8 { start, end } = *entry else {
            continue;
        };
        let payload = bytes
            .get(start..end)
            .ok_or(ClassFileError::Truncated { offset: start })?;
        let Some(replacement) = rewrite(payload) else {
            continue;
        };
        let length = u16::try_from(replacement.len()).map_err(|_| ClassFileError::Utf8TooLong {
            length: replacement.len(),
        })?;
        // The two length bytes precede the payload.
        let before = start
            .checked_sub(2)
            .and_then(|header| bytes.get(copied_to..header))
            .ok_or(ClassFileError::Truncated { offset: start })?;
        out.extend_from_slice(before);
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&replacement);
        copied_to = end;
    }

    if copied_to == 0 {
        return Ok(None);
    }
    out.extend_from_slice(bytes.get(copied_to..).unwrap_or_default());
    Ok(Some(out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ClassFileBuilder;
    use rstest::rstest;

    #[rstest]
    fn reads_this_class_and_references() {
        let bytes = ClassFileBuilder::new("com/example/Core")
            .reference("org/lib/Util")
            .reference("[Lorg/lib/Node;")
            .string("(Lorg/lib/Config;Ljava/util/List<Lorg/lib/Item;>;)V")
            .string("org.lib.Loaded")
            .build();
        let pool = ConstantPool::parse(&bytes).expect("parses");

        assert_eq!(pool.this_class().expect("header"), "com/example/Core");
        let refs = pool.referenced_classes();
        for expected in [
            "com/example/Core",
            "java/lang/Object",
            "org/lib/Util",
            "org/lib/Node",
            "org/lib/Config",
            "org/lib/Item",
            "org/lib/Loaded",
        ] {
            assert!(refs.contains(expected), "missing {expected}: {refs:?}");
        }
    }

    #[rstest]
    fn long_constants_take_two_slots() {
        let bytes = ClassFileBuilder::new("com/example/Core").with_long().build();
        let pool = ConstantPool::parse(&bytes).expect("parses");
        assert_eq!(pool.this_class().expect("header"), "com/example/Core");
    }

    #[rstest]
    #[case::empty(&[])]
    #[case::bad_magic(&[0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52, 0, 1])]
    fn rejects_non_class_bytes(#[case] bytes: &[u8]) {
        assert!(ConstantPool::parse(bytes).is_err());
    }

    #[rstest]
    fn rejects_truncated_pool() {
        let bytes = ClassFileBuilder::new("com/example/Core").build();
        let truncated = &bytes[..bytes.len() - 20];
        assert!(matches!(
            ConstantPool::parse(truncated),
            Err(ClassFileError::Truncated { .. })
        ));
    }

    #[rstest]
    fn rewrite_changes_lengths_and_keeps_structure() {
        let bytes = ClassFileBuilder::new("com/example/Core")
            .reference("org/lib/Util")
            .with_long()
            .build();

        let rewritten = rewrite_utf8(&bytes, |text| {
            (text == b"org/lib/Util").then(|| b"com/example/shadow/lib/Util".to_vec())
        })
        .expect("rewrites")
        .expect("changed");

        let pool = ConstantPool::parse(&rewritten).expect("still parses");
        assert_eq!(pool.this_class().expect("header"), "com/example/Core");
        let refs = pool.referenced_classes();
        assert!(refs.contains("com/example/shadow/lib/Util"));
        assert!(!refs.contains("org/lib/Util"));
        assert_eq!(rewritten.len(), bytes.len() + 15);
    }

    #[rstest]
    fn rewrite_without_changes_returns_none() {
        let bytes = ClassFileBuilder::new("com/example/Core").build();
        assert_eq!(rewrite_utf8(&bytes, |_| None).expect("parses"), None);
    }
}
