//! The library: current index snapshot plus the operations on it
//!
//! Searches clone the current `Arc<Index>` and run without holding any
//! lock. A refresh crawls into a fresh `Index`, persists it, and only then
//! swaps it in, so readers see either the old snapshot or the new one and
//! never a partial build. At most one refresh runs at a time.

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::Settings;
use crate::crawler::{CrawlProgress, Crawler};
use crate::error::{Error, Result};
use crate::fetcher::{HttpFetcher, ListingFetcher};
use crate::index::Index;
use crate::models::{FormatFilter, IndexStatus, MatchMode, RefreshReport, SearchHit};
use crate::query::SearchQuery;
use crate::store::IndexStore;

pub struct Library {
    base_url: Url,
    store: IndexStore,
    crawler: Crawler,
    current: RwLock<Option<Arc<Index>>>,
    settings: Mutex<Settings>,
    settings_path: Option<PathBuf>,
    refresh_gate: tokio::sync::Mutex<()>,
}

impl Library {
    /// Create a library that crawls over HTTP
    ///
    /// `settings_path` is where the refresh timestamp gets written back; pass
    /// `None` to keep it in memory only. No index is loaded yet.
    pub fn open(settings: Settings, settings_path: Option<PathBuf>) -> Result<Self> {
        let fetcher = HttpFetcher::new(&settings.source.user_agent, settings.timeout())?;
        Self::with_fetcher(settings, settings_path, Arc::new(fetcher))
    }

    /// Create a library that reads listing pages through `fetcher`
    pub fn with_fetcher(
        settings: Settings,
        settings_path: Option<PathBuf>,
        fetcher: Arc<dyn ListingFetcher>,
    ) -> Result<Self> {
        let base_url = settings.base_url()?;
        let store = IndexStore::new(settings.index_path());
        let crawler = Crawler::new(fetcher, settings.crawl.clone());

        Ok(Self {
            base_url,
            store,
            crawler,
            current: RwLock::new(None),
            settings: Mutex::new(settings),
            settings_path,
            refresh_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    pub fn settings(&self) -> Settings {
        self.settings.lock().clone()
    }

    /// The currently published snapshot, if any
    pub fn index(&self) -> Option<Arc<Index>> {
        self.current.read().clone()
    }

    /// Load the persisted index and publish it
    ///
    /// Missing or corrupt files are returned as errors; nothing is crawled.
    /// Returns the number of entries loaded.
    pub fn load(&self) -> Result<usize> {
        let index = self.store.load()?;
        let count = index.len();
        *self.current.write() = Some(Arc::new(index));
        Ok(count)
    }

    /// Matching URLs from the current snapshot, in index order
    pub fn search(&self, query_text: &str, mode: MatchMode, formats: &FormatFilter) -> Result<Vec<String>> {
        let index = self.index().ok_or(Error::NoIndex)?;
        let query = SearchQuery::new(query_text, mode, formats.clone());
        Ok(query.execute(&index))
    }

    /// Like [`Library::search`], decomposed for display and truncated to `limit`
    pub fn search_hits(
        &self,
        query_text: &str,
        mode: MatchMode,
        formats: &FormatFilter,
        limit: Option<usize>,
    ) -> Result<(usize, Vec<SearchHit>)> {
        let urls = self.search(query_text, mode, formats)?;
        let total = urls.len();
        let hits = urls
            .iter()
            .take(limit.unwrap_or(usize::MAX))
            .map(|url| SearchHit::from_url(url))
            .collect();
        Ok((total, hits))
    }

    /// Crawl the base URL, persist the result, publish it, stamp the settings
    ///
    /// On any error (cancellation included) the previous snapshot and the
    /// previous index file stay as they were.
    pub async fn refresh(
        &self,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(CrawlProgress) + Send + Sync),
    ) -> Result<RefreshReport> {
        let _gate = self.refresh_gate.try_lock().map_err(|_| Error::RefreshInProgress)?;
        let start = Instant::now();
        log::info!("Refreshing index from {}", self.base_url);

        let crawl = self.crawler.crawl(&self.base_url, cancel, on_progress).await?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let index = Index::new(crawl.files);
        let total_files = index.len();
        self.store.save(&index)?;
        *self.current.write() = Some(Arc::new(index));

        let refreshed_at = Utc::now();
        self.record_refresh(refreshed_at);

        let report = RefreshReport {
            base_url: self.base_url.to_string(),
            total_files,
            pages_visited: crawl.pages_visited,
            pages_failed: crawl.pages_failed,
            dirs_skipped: crawl.dirs_skipped,
            duration_ms: start.elapsed().as_millis() as u64,
            index_path: self.store.path().display().to_string(),
            refreshed_at: refreshed_at.to_rfc3339(),
        };
        log::info!(
            "Refresh complete: {} files from {} pages ({} failed) in {}ms",
            report.total_files,
            report.pages_visited,
            report.pages_failed,
            report.duration_ms
        );
        Ok(report)
    }

    pub fn status(&self) -> IndexStatus {
        let index = self.index();
        let last_update = self.settings.lock().state.last_update.map(|t| t.to_rfc3339());

        IndexStatus {
            base_url: self.base_url.to_string(),
            index_path: self.store.path().display().to_string(),
            loaded: index.is_some(),
            on_disk: self.store.exists(),
            total_files: index.map(|i| i.len()),
            index_size_bytes: self.store.size_bytes(),
            last_update,
        }
    }

    /// Drop the in-memory snapshot and delete the index file
    pub fn clear(&self) -> Result<bool> {
        *self.current.write() = None;
        self.store.clear()
    }

    /// Stamp the in-memory settings and the settings file
    ///
    /// Only `last_update` is written back; the file is re-read first so
    /// command-line overrides held in memory never leak into it. The new
    /// index is already live, so a failed write only loses the stamp.
    fn record_refresh(&self, at: chrono::DateTime<Utc>) {
        self.settings.lock().record_refresh(at);

        let Some(path) = &self.settings_path else { return };
        let stamped = Settings::load(path).and_then(|mut on_disk| {
            on_disk.record_refresh(at);
            on_disk.save(path)
        });
        if let Err(e) = stamped {
            log::warn!("Failed to record refresh time in {:?}: {}", path, e);
        }
    }
}
