//! Line-oriented key/value localization files.
//!
//! The format follows the usual properties conventions: `#` or `!` starts a
//! comment line, the key ends at the first unescaped `=`, `:` or whitespace,
//! and a trailing backslash continues the logical line. Values are kept
//! verbatim, escapes included, so that rewriting a file never changes the
//! text of an entry it keeps.

use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;

/// Prefix added to content display-name keys.
pub const CONTENT_KEY_PREFIX: &str = "mindustry.";

/// Ordered key/value pairs of one localization file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyList {
    entries: Vec<(String, String)>,
    index: HashMap<String, usize>,
}

impl PropertyList {
    /// Parse property text.
    ///
    /// A later duplicate key replaces the earlier value in place.
    ///
    /// # Examples
    ///
    /// ```
    /// use distpack_packager::bundle::properties::PropertyList;
    ///
    /// let list = PropertyList::parse("# header\nblock.router.name = Router\nkey: multi \\\n    line\n");
    /// assert_eq!(list.get("block.router.name"), Some("Router"));
    /// assert_eq!(list.get("key"), Some("multi line"));
    /// ```
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let mut list = Self::default();
        for line in logical_lines(text) {
            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with('!') {
                continue;
            }
            let (key, value) = split_entry(trimmed);
            list.insert(key.to_owned(), value.to_owned());
        }
        list
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, key: String, value: String) {
        if let Some(&position) = self.index.get(&key) {
            if let Some(entry) = self.entries.get_mut(position) {
                entry.1 = value;
            }
            return;
        }
        self.index.insert(key.clone(), self.entries.len());
        self.entries.push((key, value));
    }

    /// Look up a value.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.index
            .get(key)
            .and_then(|&position| self.entries.get(position))
            .map(|(_, value)| value.as_str())
    }

    /// Entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render as `key=value` lines.
    #[must_use]
    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.entries {
            out.push_str(key);
            out.push('=');
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    /// Keep only content display-name keys, prefixed with [`CONTENT_KEY_PREFIX`].
    ///
    /// # Examples
    ///
    /// ```
    /// use distpack_packager::bundle::properties::PropertyList;
    ///
    /// let list = PropertyList::parse("block.router.name=Router\nsetting.music=Music\n");
    /// let rewritten = list.content_names();
    /// assert_eq!(rewritten.get("mindustry.block.router.name"), Some("Router"));
    /// assert_eq!(rewritten.len(), 1);
    /// ```
    #[must_use]
    pub fn content_names(&self) -> Self {
        let mut out = Self::default();
        for (key, value) in &self.entries {
            if CONTENT_KEY.is_match(key) {
                out.insert(format!("{CONTENT_KEY_PREFIX}{key}"), value.clone());
            }
        }
        out
    }
}

#[expect(
    clippy::expect_used,
    reason = "the pattern is a literal and compiles on every build"
)]
static CONTENT_KEY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(block|unit|item|liquid|weather|status|planet|team)\.(.+)\.name$")
        .expect("content key pattern is valid")
});

/// Join physical lines ending in an odd number of backslashes.
fn logical_lines(text: &str) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current: Option<String> = None;
    for raw in text.lines() {
        let piece = match current {
            Some(_) => raw.trim_start(),
            None => raw,
        };
        let continues = trailing_backslashes(piece) % 2 == 1;
        let body = if continues {
            piece.strip_suffix('\\').unwrap_or(piece)
        } else {
            piece
        };
        let buffer = current.get_or_insert_with(String::new);
        buffer.push_str(body);
        if !continues {
            lines.extend(current.take());
        }
    }
    lines.extend(current);
    lines
}

fn trailing_backslashes(line: &str) -> usize {
    line.chars().rev().take_while(|&c| c == '\\').count()
}

/// Split a logical line into its key and raw value.
fn split_entry(line: &str) -> (&str, &str) {
    let mut escaped = false;
    let mut key_end = line.len();
    for (position, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' | ':' | ' ' | '\t' | '\u{c}' => {
                key_end = position;
                break;
            }
            _ => {}
        }
    }
    let (key, rest) = line.split_at(key_end);
    let rest = rest.trim_start_matches([' ', '\t', '\u{c}']);
    let rest = rest
        .strip_prefix('=')
        .or_else(|| rest.strip_prefix(':'))
        .unwrap_or(rest);
    (key, rest.trim_start_matches([' ', '\t', '\u{c}']))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::equals("a=b", "a", "b")]
    #[case::colon("a:b", "a", "b")]
    #[case::spaced("a = b", "a", "b")]
    #[case::whitespace_separator("a b", "a", "b")]
    #[case::escaped_separator(r"a\=b=c", r"a\=b", "c")]
    #[case::empty_value("a=", "a", "")]
    #[case::key_only("a", "a", "")]
    fn splits_keys_and_values(#[case] line: &str, #[case] key: &str, #[case] value: &str) {
        assert_eq!(split_entry(line), (key, value));
    }

    #[rstest]
    fn skips_comments_and_blank_lines() {
        let list = PropertyList::parse("# comment\n! also comment\n\n   \na=1\n");
        assert_eq!(list.len(), 1);
        assert_eq!(list.get("a"), Some("1"));
    }

    #[rstest]
    fn joins_continuation_lines() {
        let list = PropertyList::parse("a=one \\\n    two \\\n    three\nb=2\n");
        assert_eq!(list.get("a"), Some("one two three"));
        assert_eq!(list.get("b"), Some("2"));
    }

    #[rstest]
    fn escaped_backslash_does_not_continue() {
        let list = PropertyList::parse("a=path\\\\\nb=2\n");
        assert_eq!(list.get("a"), Some("path\\\\"));
        assert_eq!(list.get("b"), Some("2"));
    }

    #[rstest]
    fn later_duplicate_wins_in_place() {
        let list = PropertyList::parse("a=1\nb=2\na=3\n");
        let entries: Vec<_> = list.iter().collect();
        assert_eq!(entries, vec![("a", "3"), ("b", "2")]);
    }

    #[rstest]
    #[case::block("block.router.name", true)]
    #[case::unit("unit.dagger.name", true)]
    #[case::team("team.sharded.name", true)]
    #[case::description("block.router.description", false)]
    #[case::setting("setting.music.name", false)]
    #[case::no_middle("block.name", false)]
    fn content_names_filter(#[case] key: &str, #[case] kept: bool) {
        let list = PropertyList::parse(&format!("{key}=Value\n"));
        let rewritten = list.content_names();
        assert_eq!(
            rewritten.get(&format!("mindustry.{key}")).is_some(),
            kept,
            "{key}"
        );
    }

    #[rstest]
    fn render_keeps_values_verbatim() {
        let list = PropertyList::parse("block.a.name = Caf\\u00e9\n").content_names();
        assert_eq!(list.render(), "mindustry.block.a.name=Caf\\u00e9\n");
    }
}
