//! Keyword and format search over the file index
//!
//! Matching is plain case-insensitive substring containment on the whole
//! URL. There is no ranking; results come back in index order and callers
//! truncate them.

use rayon::prelude::*;

use crate::index::Index;
use crate::models::{FormatFilter, MatchMode};

/// Indexes at least this large are filtered on the rayon pool
pub const PARALLEL_THRESHOLD: usize = 50_000;

/// A parsed search request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    keywords: Vec<String>,
    mode: MatchMode,
    formats: FormatFilter,
}

impl SearchQuery {
    /// Split `text` on whitespace into lowercase keywords
    pub fn new(text: &str, mode: MatchMode, formats: FormatFilter) -> Self {
        let keywords = text.split_whitespace().map(str::to_lowercase).collect();
        Self { keywords, mode, formats }
    }

    /// Whether `url` satisfies the keyword predicate and the format filter
    ///
    /// With no keywords, `All` accepts every URL and `Any` accepts none.
    pub fn matches(&self, url: &str) -> bool {
        if !self.formats.accepts(url) {
            return false;
        }

        let haystack = url.to_lowercase();
        match self.mode {
            MatchMode::All => self.keywords.iter().all(|k| haystack.contains(k.as_str())),
            MatchMode::Any => self.keywords.iter().any(|k| haystack.contains(k.as_str())),
        }
    }

    /// All matching entries of `index`, in index order
    pub fn execute(&self, index: &Index) -> Vec<String> {
        let entries = index.entries();

        let results: Vec<String> = if entries.len() >= PARALLEL_THRESHOLD {
            entries.par_iter().filter(|url| self.matches(url)).cloned().collect()
        } else {
            entries.iter().filter(|url| self.matches(url)).cloned().collect()
        };

        log::debug!(
            "Query {:?} ({}, formats={}) matched {} of {} entries",
            self.keywords,
            self.mode,
            self.formats,
            results.len(),
            entries.len()
        );
        results
    }
}

/// Search `index` for `query_text` under `mode`, keeping only `formats`
pub fn search(index: &Index, query_text: &str, mode: MatchMode, formats: &FormatFilter) -> Vec<String> {
    SearchQuery::new(query_text, mode, formats.clone()).execute(index)
}
