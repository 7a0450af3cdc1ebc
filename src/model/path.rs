//! Dotted paths into a model tree.
//!
//! A path is parsed once into segments. Every segment keeps its raw key and,
//! when the key is a non-negative integer, the parsed index, so the same path
//! can walk through a list element or a map entry keyed by a numeric string.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One step of a [`Path`].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Segment {
    key: Arc<str>,
    index: Option<usize>,
}

impl Segment {
    /// Create a segment from an unescaped key.
    pub fn key(key: impl Into<Arc<str>>) -> Self {
        let key = key.into();
        let index = parse_index(&key);
        Self { key, index }
    }

    /// Create a segment addressing a list position.
    pub fn index(index: usize) -> Self {
        Self {
            key: index.to_string().into(),
            index: Some(index),
        }
    }

    #[inline]
    pub fn as_key(&self) -> &str {
        &self.key
    }

    #[inline]
    pub fn as_index(&self) -> Option<usize> {
        self.index
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for ch in self.key.chars() {
            match ch {
                '.' => f.write_str("\\.")?,
                '\\' => f.write_str("\\\\")?,
                other => fmt::Write::write_char(f, other)?,
            }
        }
        Ok(())
    }
}

impl From<&str> for Segment {
    fn from(key: &str) -> Self {
        Segment::key(key)
    }
}

impl From<String> for Segment {
    fn from(key: String) -> Self {
        Segment::key(key)
    }
}

impl From<usize> for Segment {
    fn from(index: usize) -> Self {
        Segment::index(index)
    }
}

fn parse_index(key: &str) -> Option<usize> {
    if key.is_empty() || !key.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    key.parse().ok()
}

/// A location inside a model tree. The empty path is the root.
///
/// ```
/// use formtree::model::Path;
///
/// let path = Path::parse("lists.emails.1.email");
/// assert_eq!(path.len(), 4);
/// assert_eq!(path.segments()[2].as_index(), Some(1));
/// assert_eq!(path.to_string(), "lists.emails.1.email");
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Path(Vec<Segment>);

impl Path {
    #[inline]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path. `\.` keeps a literal dot inside a key and `\\` a
    /// literal backslash.
    pub fn parse(source: &str) -> Self {
        if source.is_empty() {
            return Self::root();
        }

        let mut segments = Vec::new();
        let mut current = String::new();
        let mut chars = source.chars();
        while let Some(ch) = chars.next() {
            match ch {
                '\\' => match chars.next() {
                    Some(escaped) => current.push(escaped),
                    None => current.push('\\'),
                },
                '.' => segments.push(Segment::key(std::mem::take(&mut current))),
                other => current.push(other),
            }
        }
        segments.push(Segment::key(current));
        Self(segments)
    }

    #[inline]
    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self(segments)
    }

    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.0
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns a new path with `segment` appended.
    pub fn child(&self, segment: impl Into<Segment>) -> Path {
        let mut segments = Vec::with_capacity(self.0.len() + 1);
        segments.extend(self.0.iter().cloned());
        segments.push(segment.into());
        Path(segments)
    }

    /// Returns a new path with every segment of `other` appended.
    pub fn join(&self, other: &Path) -> Path {
        let mut segments = self.0.clone();
        segments.extend(other.0.iter().cloned());
        Path(segments)
    }

    /// Split into the parent path and the final segment. `None` for the root.
    pub fn split_last(&self) -> Option<(Path, &Segment)> {
        let (last, parent) = self.0.split_last()?;
        Some((Path(parent.to_vec()), last))
    }

    /// String-prefix test on the dotted form, matching how error queries
    /// group locations.
    pub fn has_prefix(&self, prefix: &str) -> bool {
        prefix.is_empty() || self.to_string().starts_with(prefix)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, segment) in self.0.iter().enumerate() {
            if position > 0 {
                f.write_str(".")?;
            }
            write!(f, "{segment}")?;
        }
        Ok(())
    }
}

impl From<&str> for Path {
    fn from(source: &str) -> Self {
        Path::parse(source)
    }
}

impl From<String> for Path {
    fn from(source: String) -> Self {
        Path::parse(&source)
    }
}

impl From<&String> for Path {
    fn from(source: &String) -> Self {
        Path::parse(source)
    }
}

impl From<&Path> for Path {
    fn from(path: &Path) -> Self {
        path.clone()
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

impl PartialEq<str> for Path {
    fn eq(&self, other: &str) -> bool {
        *self == Path::parse(other)
    }
}

impl PartialEq<&str> for Path {
    fn eq(&self, other: &&str) -> bool {
        *self == Path::parse(other)
    }
}

impl FromIterator<Segment> for Path {
    fn from_iter<I: IntoIterator<Item = Segment>>(iter: I) -> Self {
        Path(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Segment;
    type IntoIter = std::slice::Iter<'a, Segment>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
