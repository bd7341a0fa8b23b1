//! Collation service used by string-domain expression nodes.
//!
//! Nodes never compare or scan string bytes directly; they go through a
//! [`Collation`] so that multi-byte character boundaries and case folding
//! are respected when counting character positions.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Character set a collation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Charset {
    Binary,
    Utf8mb4,
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Binary => "binary",
            Charset::Utf8mb4 => "utf8mb4",
        }
    }

    /// Maximum bytes per character.
    pub fn mbmaxlen(&self) -> u32 {
        match self {
            Charset::Binary => 1,
            Charset::Utf8mb4 => 4,
        }
    }
}

/// Comparison and scanning rules for strings.
pub trait Collation: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn charset(&self) -> Charset;

    fn compare(&self, a: &str, b: &str) -> Ordering;

    /// Character position (0-based) of the first match of `needle` in
    /// `haystack` at or after character `from`.
    fn find_substring(&self, haystack: &str, needle: &str, from: usize) -> Option<usize>;

    fn char_length(&self, s: &str) -> usize;

    /// Byte length of the first character of `s` (0 for an empty string).
    fn first_char_len(&self, s: &str) -> usize;
}

/// Byte-wise comparison, one byte per character.
#[derive(Debug)]
pub struct BinaryCollation;

/// UTF-8 characters compared by code point, trailing spaces ignored.
#[derive(Debug)]
pub struct Utf8Bin;

/// UTF-8 characters compared case-insensitively, trailing spaces ignored.
#[derive(Debug)]
pub struct Utf8GeneralCi;

fn trim_pad(s: &str) -> &str {
    s.trim_end_matches(' ')
}

fn fold(c: char) -> char {
    c.to_uppercase().next().unwrap_or(c)
}

fn char_offset(s: &str, chars: usize) -> Option<usize> {
    if chars == 0 {
        return Some(0);
    }
    s.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .nth(chars)
}

impl Collation for BinaryCollation {
    fn name(&self) -> &'static str {
        "binary"
    }

    fn charset(&self) -> Charset {
        Charset::Binary
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        a.as_bytes().cmp(b.as_bytes())
    }

    fn find_substring(&self, haystack: &str, needle: &str, from: usize) -> Option<usize> {
        let hay = haystack.as_bytes();
        let needle = needle.as_bytes();
        if from > hay.len() {
            return None;
        }
        if needle.is_empty() {
            return Some(from);
        }
        hay[from..]
            .windows(needle.len())
            .position(|w| w == needle)
            .map(|p| p + from)
    }

    fn char_length(&self, s: &str) -> usize {
        s.len()
    }

    fn first_char_len(&self, s: &str) -> usize {
        s.len().min(1)
    }
}

impl Collation for Utf8Bin {
    fn name(&self) -> &'static str {
        "utf8mb4_bin"
    }

    fn charset(&self) -> Charset {
        Charset::Utf8mb4
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        trim_pad(a).chars().cmp(trim_pad(b).chars())
    }

    fn find_substring(&self, haystack: &str, needle: &str, from: usize) -> Option<usize> {
        let start = char_offset(haystack, from)?;
        let byte_pos = haystack[start..].find(needle)? + start;
        Some(haystack[..byte_pos].chars().count())
    }

    fn char_length(&self, s: &str) -> usize {
        s.chars().count()
    }

    fn first_char_len(&self, s: &str) -> usize {
        s.chars().next().map_or(0, char::len_utf8)
    }
}

impl Collation for Utf8GeneralCi {
    fn name(&self) -> &'static str {
        "utf8mb4_general_ci"
    }

    fn charset(&self) -> Charset {
        Charset::Utf8mb4
    }

    fn compare(&self, a: &str, b: &str) -> Ordering {
        trim_pad(a)
            .chars()
            .map(fold)
            .cmp(trim_pad(b).chars().map(fold))
    }

    fn find_substring(&self, haystack: &str, needle: &str, from: usize) -> Option<usize> {
        let hay: Vec<char> = haystack.chars().map(fold).collect();
        let pattern: Vec<char> = needle.chars().map(fold).collect();
        if from > hay.len() {
            return None;
        }
        if pattern.is_empty() {
            return Some(from);
        }
        hay[from..]
            .windows(pattern.len())
            .position(|w| w == pattern.as_slice())
            .map(|p| p + from)
    }

    fn char_length(&self, s: &str) -> usize {
        s.chars().count()
    }

    fn first_char_len(&self, s: &str) -> usize {
        s.chars().next().map_or(0, char::len_utf8)
    }
}

static BINARY: BinaryCollation = BinaryCollation;
static UTF8_BIN: Utf8Bin = Utf8Bin;
static UTF8_GENERAL_CI: Utf8GeneralCi = Utf8GeneralCi;

/// Identifies one of the built-in collations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CollationId {
    Binary,
    Utf8mb4Bin,
    #[default]
    Utf8mb4GeneralCi,
}

impl CollationId {
    pub fn collation(&self) -> &'static dyn Collation {
        match self {
            CollationId::Binary => &BINARY,
            CollationId::Utf8mb4Bin => &UTF8_BIN,
            CollationId::Utf8mb4GeneralCi => &UTF8_GENERAL_CI,
        }
    }

    pub fn from_name(name: &str) -> Option<CollationId> {
        match name.to_ascii_lowercase().as_str() {
            "binary" => Some(CollationId::Binary),
            "utf8mb4_bin" => Some(CollationId::Utf8mb4Bin),
            "utf8mb4_general_ci" => Some(CollationId::Utf8mb4GeneralCi),
            _ => None,
        }
    }

    /// Collation used when two string operands meet: binary wins, then a
    /// `_bin` collation, then the case-insensitive one.
    pub fn aggregate(self, other: CollationId) -> CollationId {
        use CollationId::*;
        match (self, other) {
            (Binary, _) | (_, Binary) => Binary,
            (Utf8mb4Bin, _) | (_, Utf8mb4Bin) => Utf8mb4Bin,
            _ => Utf8mb4GeneralCi,
        }
    }
}

impl fmt::Display for CollationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.collation().name())
    }
}
