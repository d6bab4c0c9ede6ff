//! Error types for the index builder and search engine
//!
//! Page-level remote failures are recorded and skipped by the crawler; the
//! variants here are the conditions a caller actually has to act on.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A single listing page could not be fetched (network, timeout, non-2xx)
    #[error("Failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// No persisted index exists yet
    #[error("No index found at {}. Run 'dirdex refresh' to build one.", path.display())]
    IndexNotFound { path: PathBuf },

    /// The persisted index exists but cannot be read back
    #[error("Index at {} is corrupt ({reason}). Run 'dirdex refresh' to rebuild it.", path.display())]
    IndexCorrupt { path: PathBuf, reason: String },

    /// Search attempted before any index was loaded or built
    #[error("No index loaded. Run 'dirdex refresh' first.")]
    NoIndex,

    /// Writing the index or settings file failed; the previous file is untouched
    #[error("Failed to write {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Refresh cancelled")]
    Cancelled,

    #[error("A refresh is already running")]
    RefreshInProgress,

    #[error("Invalid base URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Invalid configuration in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// True for the two conditions that mean "there is nothing usable on disk"
    pub fn is_missing_index(&self) -> bool {
        matches!(self, Error::IndexNotFound { .. } | Error::IndexCorrupt { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
