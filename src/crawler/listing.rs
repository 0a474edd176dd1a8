//! Listing stage
//!
//! A fixed pool of workers walks the listing page range. Workers share a
//! cursor, so pages are handed out in increasing order; each page is fetched,
//! its result rows are parsed, and every profile link found is pushed onto the
//! profile queue right away.

use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::parser::extract_company_links;
use crate::output::Progress;
use crate::url::generate_page_url;
use crate::HarvestError;
use std::ops::AddAssign;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A profile link discovered on a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyLink {
    /// The href exactly as it appeared in the listing row
    pub href: String,

    /// The listing page it was found on (relative hrefs resolve against it)
    pub source: Url,
}

/// What happened to a single listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageOutcome {
    /// Fetched and parsed; holds the links in document order (may be empty)
    Parsed(Vec<CompanyLink>),

    /// The fetch failed; the page is skipped
    Failed,

    /// The run was cancelled before the page was dispatched
    Cancelled,
}

/// Counters for one listing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListingReport {
    pub pages_fetched: u64,
    pub pages_failed: u64,
    /// Fetched pages without a single result row
    pub pages_without_rows: u64,
    pub links_found: u64,
}

impl AddAssign for ListingReport {
    fn add_assign(&mut self, other: Self) {
        self.pages_fetched += other.pages_fetched;
        self.pages_failed += other.pages_failed;
        self.pages_without_rows += other.pages_without_rows;
        self.links_found += other.links_found;
    }
}

/// Listing page worker pool
#[derive(Clone)]
pub struct ListingStage {
    fetcher: Arc<dyn PageFetcher>,
    base_url: Url,
    first_page: u32,
    last_page: u32,
    workers: usize,
    cancel: CancellationToken,
}

impl ListingStage {
    /// Creates a stage covering pages `first_page..=last_page`
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        base_url: Url,
        first_page: u32,
        last_page: u32,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            base_url,
            first_page,
            last_page,
            workers: workers.max(1),
            cancel,
        }
    }

    /// Number of pages in the range
    pub fn page_count(&self) -> u64 {
        (self.last_page as u64 + 1).saturating_sub(self.first_page as u64)
    }

    /// Fetches and parses one listing page
    ///
    /// A failed fetch is logged and reported as [`PageOutcome::Failed`]; it
    /// never ends the stage.
    pub async fn crawl_page(&self, page: u32) -> PageOutcome {
        let page_url = generate_page_url(&self.base_url, page);
        tracing::debug!("Scraping listing page {}", page);

        match self.fetcher.fetch(page_url.as_str()).await {
            Ok(body) => {
                let links = extract_company_links(&body)
                    .into_iter()
                    .map(|href| CompanyLink {
                        href,
                        source: page_url.clone(),
                    })
                    .collect();
                PageOutcome::Parsed(links)
            }
            Err(FetchError::Cancelled { .. }) => PageOutcome::Cancelled,
            Err(e) => {
                tracing::warn!("Listing page {} skipped: {}", page, e);
                PageOutcome::Failed
            }
        }
    }

    /// Runs the worker pool until the range is exhausted or the run is cancelled
    ///
    /// Discovered links are sent into `queue` as soon as their page is parsed.
    /// The sender is dropped when the last worker finishes, which is what lets
    /// the profile stage drain and stop.
    pub async fn run(
        self,
        queue: mpsc::Sender<CompanyLink>,
        progress: Arc<Progress>,
    ) -> Result<ListingReport, HarvestError> {
        tracing::info!(
            "Listing stage: pages {}..={} with {} workers",
            self.first_page,
            self.last_page,
            self.workers
        );

        let cursor = Arc::new(AtomicU64::new(self.first_page as u64));
        let mut handles = Vec::with_capacity(self.workers);

        for worker_id in 0..self.workers {
            let stage = self.clone();
            let cursor = cursor.clone();
            let queue = queue.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                stage.worker(worker_id, cursor, queue, progress).await
            }));
        }
        drop(queue);

        let mut report = ListingReport::default();
        let mut crashed = None;
        for handle in handles {
            match handle.await {
                Ok(worker_report) => report += worker_report,
                Err(e) => {
                    tracing::error!("Listing worker crashed: {}", e);
                    crashed.get_or_insert(e);
                }
            }
        }
        if let Some(e) = crashed {
            return Err(e.into());
        }

        tracing::info!(
            "Listing stage done: {} pages fetched, {} failed, {} links found",
            report.pages_fetched,
            report.pages_failed,
            report.links_found
        );

        Ok(report)
    }

    async fn worker(
        &self,
        worker_id: usize,
        cursor: Arc<AtomicU64>,
        queue: mpsc::Sender<CompanyLink>,
        progress: Arc<Progress>,
    ) -> ListingReport {
        let mut report = ListingReport::default();

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("Listing worker {} stopping: cancelled", worker_id);
                break;
            }

            let page = cursor.fetch_add(1, Ordering::SeqCst);
            if page > self.last_page as u64 {
                break;
            }
            let page = page as u32;

            match self.crawl_page(page).await {
                PageOutcome::Cancelled => {
                    tracing::debug!("Listing worker {} stopping: cancelled", worker_id);
                    break;
                }
                PageOutcome::Failed => report.pages_failed += 1,
                PageOutcome::Parsed(links) => {
                    report.pages_fetched += 1;
                    if links.is_empty() {
                        tracing::debug!("Listing page {} has no result rows", page);
                        report.pages_without_rows += 1;
                    }

                    for link in links {
                        report.links_found += 1;
                        if queue.send(link).await.is_err() {
                            tracing::debug!(
                                "Listing worker {} stopping: profile queue closed",
                                worker_id
                            );
                            progress.tick();
                            return report;
                        }
                    }
                }
            }

            progress.tick();
        }

        report
    }
}
