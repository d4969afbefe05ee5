//! Field paths
//!
//! A field path is the slash-separated chain of local element names from the
//! walk root down to a node, e.g. `MDRDevice/MDRUDIDIData[1]/identifier/DICode`.
//! Instances of repeated elements carry a zero-based `[i]` suffix. Configuration
//! is keyed by the normalized (index-free) form of a path.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

static INDEX_SUFFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[\d+\]").unwrap());

/// Separator between path segments
pub const SEPARATOR: char = '/';

/// An immutable, slash-separated element path
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(String);

impl FieldPath {
    /// Wrap an existing path string
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Build a path from ancestor local names, optionally indexing the last segment
    pub fn build<I, S>(ancestors: I, index: Option<usize>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut path = String::new();
        for name in ancestors {
            if !path.is_empty() {
                path.push(SEPARATOR);
            }
            path.push_str(name.as_ref());
        }
        if let Some(i) = index {
            path.push_str(&format!("[{}]", i));
        }
        Self(path)
    }

    /// Path of a child element
    pub fn child(&self, local_name: &str) -> Self {
        if self.0.is_empty() {
            Self(local_name.to_string())
        } else {
            Self(format!("{}{}{}", self.0, SEPARATOR, local_name))
        }
    }

    /// Path of the `index`-th instance of a repeated element
    pub fn indexed(&self, index: usize) -> Self {
        Self(format!("{}[{}]", self.0, index))
    }

    /// The index-free configuration key for this path
    pub fn normalize(&self) -> Self {
        Self(normalize(&self.0))
    }

    /// Check whether `other` lies strictly below this path
    pub fn is_ancestor_of(&self, other: &str) -> bool {
        other.len() > self.0.len() + 1
            && other.starts_with(self.0.as_str())
            && other[self.0.len()..].starts_with(SEPARATOR)
    }

    /// Iterate over the path segments
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split(SEPARATOR).filter(|s| !s.is_empty())
    }

    /// Local name of the last segment, without index suffix
    pub fn local_name(&self) -> &str {
        let last = self.0.rsplit(SEPARATOR).next().unwrap_or("");
        last.split('[').next().unwrap_or(last)
    }

    /// Number of segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Get the path as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for FieldPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for FieldPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}

/// Join ancestor names into a path, appending `[index]` to the last segment
pub fn build_path<I, S>(ancestors: I, index: Option<usize>) -> FieldPath
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    FieldPath::build(ancestors, index)
}

/// Remove every `[<digits>]` index suffix from a path.
///
/// Removal repeats until none is left, so brackets joined by an inner removal
/// (`B[[1]2]`) are removed as well.
pub fn normalize(path: &str) -> String {
    let mut normalized = path.to_string();
    while INDEX_SUFFIX.is_match(&normalized) {
        normalized = INDEX_SUFFIX.replace_all(&normalized, "").into_owned();
    }
    normalized
}

/// Split a segment such as `MDRUDIDIData[2]` into its name and index
pub fn split_index(segment: &str) -> (&str, Option<usize>) {
    if let Some(open) = segment.find('[') {
        if let Some(digits) = segment[open + 1..].strip_suffix(']') {
            if let Ok(index) = digits.parse() {
                return (&segment[..open], Some(index));
            }
        }
    }
    (segment, None)
}
