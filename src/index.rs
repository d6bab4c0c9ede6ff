//! The in-memory file index
//!
//! An `Index` is an immutable, ordered list of absolute file URLs. It is
//! built once per refresh and shared by `Arc` between readers; nothing
//! mutates it after construction.

use serde::{Deserialize, Serialize};
use url::Url;

/// Ordered snapshot of file URLs discovered by a crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    entries: Vec<String>,
}

impl Index {
    pub fn new(entries: Vec<String>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.entries.iter()
    }

    /// Check that every entry is an absolute URL naming a file
    ///
    /// Returns a description of the first offending entry.
    pub fn validate(&self) -> Result<(), String> {
        for (position, entry) in self.entries.iter().enumerate() {
            if entry.ends_with('/') {
                return Err(format!("entry {} is a directory URL: {}", position, entry));
            }
            if let Err(e) = Url::parse(entry) {
                return Err(format!("entry {} is not an absolute URL ({}): {}", position, e, entry));
            }
        }
        Ok(())
    }
}

impl FromIterator<String> for Index {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Index {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
