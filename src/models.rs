//! Core data models for Dirdex
//!
//! These structures are the values that cross the library boundary: query
//! options going in, hits and reports coming out.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;
use strum::{Display, EnumString};

/// How keywords combine when matching a URL
#[derive(
    Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum MatchMode {
    /// Every keyword must appear in the URL
    #[default]
    All,
    /// At least one keyword must appear in the URL
    Any,
}

/// Accepted file extensions for a search
///
/// `Any` is the "ALL" sentinel. Extensions are stored lowercased without the
/// leading dot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum FormatFilter {
    #[default]
    Any,
    Extensions(BTreeSet<String>),
}

impl FormatFilter {
    /// Parse a comma-separated extension list such as `"EPUB, pdf"`
    ///
    /// An empty string, `ALL` (any case), or a list with no non-empty
    /// entries accepts every extension.
    pub fn parse(spec: &str) -> Self {
        let spec = spec.trim();
        if spec.is_empty() || spec.eq_ignore_ascii_case("all") {
            return FormatFilter::Any;
        }

        let extensions: BTreeSet<String> = spec
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        if extensions.is_empty() {
            FormatFilter::Any
        } else {
            FormatFilter::Extensions(extensions)
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, FormatFilter::Any)
    }

    /// Check the text after the URL's last `.` against the accepted set
    pub fn accepts(&self, url: &str) -> bool {
        match self {
            FormatFilter::Any => true,
            FormatFilter::Extensions(set) => match url.rfind('.') {
                Some(pos) => set.contains(&url[pos + 1..].to_lowercase()),
                None => false,
            },
        }
    }
}

impl FromStr for FormatFilter {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FormatFilter::parse(s))
    }
}

impl fmt::Display for FormatFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatFilter::Any => write!(f, "ALL"),
            FormatFilter::Extensions(set) => {
                let upper: Vec<String> = set.iter().map(|e| e.to_uppercase()).collect();
                write!(f, "{}", upper.join(","))
            }
        }
    }
}

/// A matching index entry, decomposed for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SearchHit {
    /// Absolute URL of the file, as stored in the index
    pub url: String,
    /// Percent-decoded last path segment
    pub name: String,
    /// File name without its last extension
    pub stem: String,
    /// Upper-cased extension (empty when the name has none)
    pub extension: String,
    /// URL of the directory listing that contains the file
    pub parent: String,
}

impl SearchHit {
    pub fn from_url(url: &str) -> Self {
        let (parent, raw_name) = match url.rfind('/') {
            Some(pos) => (&url[..=pos], &url[pos + 1..]),
            None => ("", url),
        };

        let name = urlencoding::decode(raw_name)
            .map(|decoded| decoded.into_owned())
            .unwrap_or_else(|_| raw_name.to_string());

        let (stem, extension) = match name.rfind('.') {
            Some(pos) if pos > 0 => (name[..pos].to_string(), name[pos + 1..].to_uppercase()),
            _ => (name.clone(), String::new()),
        };

        Self {
            url: url.to_string(),
            name,
            stem,
            extension,
            parent: parent.to_string(),
        }
    }
}

/// Outcome of a completed refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshReport {
    /// Base URL the crawl started from
    pub base_url: String,
    /// File URLs in the new index
    pub total_files: usize,
    /// Listing pages fetched successfully
    pub pages_visited: usize,
    /// Listing pages that failed and were skipped
    pub pages_failed: usize,
    /// Directories not visited because of the depth or page bounds
    pub dirs_skipped: usize,
    /// Wall-clock duration of crawl plus persist
    pub duration_ms: u64,
    /// Where the index was written
    pub index_path: String,
    /// Refresh timestamp (RFC 3339, UTC)
    pub refreshed_at: String,
}

/// Snapshot of what the library currently holds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStatus {
    pub base_url: String,
    pub index_path: String,
    /// Whether an index is loaded in memory
    pub loaded: bool,
    /// Whether the index file exists on disk
    pub on_disk: bool,
    /// Entries in the loaded index
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    /// Compressed size of the index file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_size_bytes: Option<u64>,
    /// Last successful refresh (RFC 3339), from the settings file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<String>,
}
