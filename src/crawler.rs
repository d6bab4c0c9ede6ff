//! Crawler for open directory trees
//!
//! Walks the remote tree with an explicit work queue instead of recursion.
//! Listing pages are fetched concurrently (bounded), each directory URL is
//! visited at most once, and depth/page bounds stop runaway servers. Once
//! every page is in, the file list is assembled depth-first in page order,
//! so the output does not depend on which fetch finished first.

use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{Error, Result};
use crate::fetcher::ListingFetcher;
use crate::listing::{child_links, is_directory};

/// Bounds and parallelism for a crawl
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CrawlConfig {
    /// Concurrent page fetches (0 = auto: CPU count clamped to 4..=16)
    pub concurrency: usize,
    /// Deepest directory level below the base URL that is visited
    pub max_depth: usize,
    /// Most listing pages fetched in one crawl
    pub max_pages: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            concurrency: 0,
            max_depth: 32,
            max_pages: 100_000,
        }
    }
}

impl CrawlConfig {
    pub fn effective_concurrency(&self) -> usize {
        if self.concurrency == 0 {
            num_cpus::get().clamp(4, 16)
        } else {
            self.concurrency
        }
    }
}

/// Progress snapshot passed to the observer after every page
#[derive(Debug, Clone, Copy, Default)]
pub struct CrawlProgress {
    pub pages_done: usize,
    pub pages_failed: usize,
    pub pages_pending: usize,
    pub files_found: usize,
}

/// Result of a finished crawl
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// File URLs, depth-first in page order, without duplicates
    pub files: Vec<String>,
    pub pages_visited: usize,
    pub pages_failed: usize,
    pub dirs_skipped: usize,
    pub duration_ms: u64,
}

/// Discovers every file URL beneath a base directory
pub struct Crawler {
    fetcher: Arc<dyn ListingFetcher>,
    config: CrawlConfig,
}

impl Crawler {
    pub fn new(fetcher: Arc<dyn ListingFetcher>, config: CrawlConfig) -> Self {
        Self { fetcher, config }
    }

    /// Child links of one listing page
    ///
    /// Fetch failures are returned to the caller; a page without a listing
    /// block yields an empty vector.
    pub async fn fetch_links(&self, dir: &Url) -> Result<Vec<Url>> {
        let html = self.fetcher.fetch(dir).await?;
        Ok(child_links(dir, &html))
    }

    /// Crawl the tree rooted at `base` (a directory URL ending in `/`)
    ///
    /// Pages that fail are logged, counted and skipped, the base page
    /// included. The crawl itself only fails when `base` is not a directory
    /// URL or when `cancel` fires.
    pub async fn crawl(
        &self,
        base: &Url,
        cancel: &CancellationToken,
        on_progress: &(dyn Fn(CrawlProgress) + Send + Sync),
    ) -> Result<CrawlReport> {
        if !is_directory(base) {
            return Err(Error::InvalidUrl {
                url: base.to_string(),
                reason: "crawl root must end with '/'".to_string(),
            });
        }

        let start = Instant::now();
        let concurrency = self.config.effective_concurrency();
        log::info!(
            "Crawling {} (concurrency={}, max_depth={}, max_pages={})",
            base,
            concurrency,
            self.config.max_depth,
            self.config.max_pages
        );

        let mut visited: HashSet<String> = HashSet::from([base.to_string()]);
        let mut queue: VecDeque<(Url, usize)> = VecDeque::from([(base.clone(), 0)]);
        let mut listings: HashMap<String, Vec<Url>> = HashMap::new();
        let mut in_flight = FuturesUnordered::new();
        let mut progress = CrawlProgress::default();
        let mut dirs_skipped = 0usize;

        loop {
            while in_flight.len() < concurrency {
                let Some((url, depth)) = queue.pop_front() else { break };
                let fetcher = Arc::clone(&self.fetcher);
                in_flight.push(async move {
                    let result = fetcher.fetch(&url).await;
                    (url, depth, result)
                });
            }

            if in_flight.is_empty() {
                break;
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log::info!("Crawl of {} cancelled after {} pages", base, progress.pages_done);
                    return Err(Error::Cancelled);
                }
                next = in_flight.next() => next,
            };
            let Some((url, depth, result)) = next else { break };

            match result {
                Ok(html) => {
                    let children: Vec<Url> = child_links(&url, &html)
                        .into_iter()
                        .filter(|child| child.as_str().starts_with(base.as_str()))
                        .collect();
                    log::debug!("{} lists {} entries", url, children.len());

                    for child in &children {
                        if !is_directory(child) {
                            progress.files_found += 1;
                            continue;
                        }
                        if visited.contains(child.as_str()) {
                            continue;
                        }
                        if depth + 1 > self.config.max_depth {
                            log::warn!("Not descending into {}: depth limit {} reached", child, self.config.max_depth);
                            dirs_skipped += 1;
                        } else if visited.len() >= self.config.max_pages {
                            log::warn!("Not descending into {}: page limit {} reached", child, self.config.max_pages);
                            dirs_skipped += 1;
                        } else {
                            visited.insert(child.to_string());
                            queue.push_back((child.clone(), depth + 1));
                        }
                    }

                    listings.insert(url.to_string(), children);
                    progress.pages_done += 1;
                }
                Err(e) => {
                    log::warn!("Skipping {}: {}", url, e);
                    progress.pages_failed += 1;
                }
            }

            progress.pages_pending = queue.len() + in_flight.len();
            on_progress(progress);
        }

        let files = assemble_depth_first(base, &listings);
        let duration_ms = start.elapsed().as_millis() as u64;

        if progress.pages_failed > 0 {
            log::warn!(
                "Crawl of {} finished with {} failed page(s); their subtrees are missing from the index",
                base,
                progress.pages_failed
            );
        }
        log::info!(
            "Crawled {} pages, found {} files in {}ms",
            progress.pages_done,
            files.len(),
            duration_ms
        );

        Ok(CrawlReport {
            files,
            pages_visited: progress.pages_done,
            pages_failed: progress.pages_failed,
            dirs_skipped,
            duration_ms,
        })
    }
}

/// Flatten per-page listings: each directory's files, then its
/// subdirectories in the order they were listed
fn assemble_depth_first(base: &Url, listings: &HashMap<String, Vec<Url>>) -> Vec<String> {
    let mut files = Vec::new();
    let mut seen_files: HashSet<&str> = HashSet::new();
    let mut expanded: HashSet<&str> = HashSet::new();
    let mut stack: Vec<&str> = vec![base.as_str()];

    while let Some(dir) = stack.pop() {
        if !expanded.insert(dir) {
            continue;
        }
        let Some(children) = listings.get(dir) else { continue };

        let mut subdirs = Vec::new();
        for child in children {
            if is_directory(child) {
                subdirs.push(child.as_str());
            } else if seen_files.insert(child.as_str()) {
                files.push(child.to_string());
            }
        }
        stack.extend(subdirs.into_iter().rev());
    }

    files
}
