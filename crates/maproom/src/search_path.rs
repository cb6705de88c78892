//! Ordered list of data directories consulted when resolving assets
//!
//! The active project root is appended when a context becomes valid and
//! removed when the context is replaced. The delimiter-joined string form
//! exists for interop with environment-style consumers.

use std::path::{Path, PathBuf};

/// Delimiter used when joining the list into a single string
#[cfg(windows)]
pub const PATH_LIST_DELIMITER: char = ';';
/// Delimiter used when joining the list into a single string
#[cfg(not(windows))]
pub const PATH_LIST_DELIMITER: char = ':';

/// Ordered, deduplicating list of data directories
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPath {
    entries: Vec<PathBuf>,
}

impl SearchPath {
    /// Create an empty search path
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a delimiter-joined path list, skipping empty segments
    pub fn from_delimited(list: &str) -> Self {
        let entries = list
            .split(PATH_LIST_DELIMITER)
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .collect();
        Self { entries }
    }

    /// All entries in search order
    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Whether a directory is already listed
    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        self.entries.iter().any(|p| p == path)
    }

    /// Append a directory; a directory already listed keeps its position
    pub fn add(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.contains(&path) {
            self.entries.push(path);
        }
    }

    /// Remove a directory; returns false if it was not listed
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let Some(idx) = self.entries.iter().position(|p| p == path) else {
            return false;
        };
        self.entries.remove(idx);
        true
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Delimiter-joined string form
    pub fn to_delimited(&self) -> String {
        self.entries
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(&PATH_LIST_DELIMITER.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_deduplicates() {
        let mut sp = SearchPath::new();
        sp.add("/data/a");
        sp.add("/data/b");
        sp.add("/data/a");
        assert_eq!(sp.len(), 2);
        assert!(sp.contains("/data/a"));
    }

    #[test]
    fn test_remove_preserves_order() {
        let mut sp = SearchPath::new();
        sp.add("/data/a");
        sp.add("/data/b");
        sp.add("/data/c");
        assert!(sp.remove("/data/b"));
        assert!(!sp.remove("/data/b"));
        assert_eq!(
            sp.entries(),
            &[PathBuf::from("/data/a"), PathBuf::from("/data/c")]
        );
    }

    #[test]
    fn test_delimited_round_trip() {
        let mut sp = SearchPath::new();
        sp.add("/data/a");
        sp.add("/data/b");
        let joined = sp.to_delimited();
        assert_eq!(SearchPath::from_delimited(&joined), sp);
    }

    #[test]
    fn test_from_delimited_skips_empty_segments() {
        let raw = format!(
            "{d}/data/a{d}{d}/data/b{d}",
            d = PATH_LIST_DELIMITER
        );
        let sp = SearchPath::from_delimited(&raw);
        assert_eq!(sp.len(), 2);
    }
}
