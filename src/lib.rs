//! Dirdex: crawl an open directory listing and search it offline
//!
//! Dirdex walks a web server's auto-generated directory listings (Apache,
//! nginx and lighttpd index pages), collects every file URL below a base
//! directory into a flat index, persists that index as gzip-compressed JSON,
//! and answers keyword/format queries against it entirely in memory.
//!
//! # Architecture
//!
//! - **Listing**: extracts child links from one listing page
//! - **Crawler**: bounded-concurrency walk of the directory tree, reassembled
//!   in depth-first order
//! - **Store**: atomic load/save of the index file
//! - **Query**: ALL/ANY keyword matching with an extension filter
//! - **Library**: owns the current index snapshot and serializes refreshes
//!
//! # Example Usage
//!
//! ```no_run
//! use dirdex::{Library, Settings, FormatFilter, MatchMode};
//!
//! let library = Library::open(Settings::default(), None).unwrap();
//! library.load().unwrap();
//!
//! let urls = library
//!     .search("mahatma gandhi", MatchMode::All, &FormatFilter::parse("EPUB"))
//!     .unwrap();
//! for url in urls {
//!     println!("{}", url);
//! }
//! ```

pub mod cli;
pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod index;
pub mod library;
pub mod listing;
pub mod models;
pub mod output;
pub mod query;
pub mod server;
pub mod store;

// Re-export commonly used types
pub use config::Settings;
pub use crawler::{CrawlConfig, CrawlProgress, CrawlReport, Crawler};
pub use error::{Error, Result};
pub use fetcher::{HttpFetcher, ListingFetcher};
pub use index::Index;
pub use library::Library;
pub use models::{FormatFilter, IndexStatus, MatchMode, RefreshReport, SearchHit};
pub use query::{search, SearchQuery};
pub use store::IndexStore;
