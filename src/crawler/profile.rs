//! Profile stage
//!
//! Workers drain the queue filled by the listing stage. Each profile link is
//! resolved, checked against the allowed domains, fetched, and the company
//! website link found on the page is appended to the shared collector.

use crate::crawler::collector::Collector;
use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::crawler::listing::CompanyLink;
use crate::crawler::parser::extract_company_urls;
use crate::output::Progress;
use crate::url::{extract_domain, is_allowed_domain, resolve_link};
use crate::HarvestError;
use std::ops::AddAssign;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;

/// What happened to a single profile link
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileOutcome {
    /// Fetched; holds the company URLs found (empty when the page had none)
    Found(Vec<String>),

    /// The href could not be resolved or points outside the allowed domains
    Skipped,

    /// The fetch failed; the link is dropped
    Failed,

    /// The run was cancelled before the profile was dispatched
    Cancelled,
}

/// Counters for one profile run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProfileReport {
    pub profiles_fetched: u64,
    pub profiles_failed: u64,
    pub links_skipped: u64,
    /// Fetched profiles without a company link
    pub profiles_without_url: u64,
    pub urls_found: u64,
}

impl AddAssign for ProfileReport {
    fn add_assign(&mut self, other: Self) {
        self.profiles_fetched += other.profiles_fetched;
        self.profiles_failed += other.profiles_failed;
        self.links_skipped += other.links_skipped;
        self.profiles_without_url += other.profiles_without_url;
        self.urls_found += other.urls_found;
    }
}

/// Profile page worker pool
#[derive(Clone)]
pub struct ProfileStage {
    fetcher: Arc<dyn PageFetcher>,
    allowed_domains: Arc<Vec<String>>,
    workers: usize,
    cancel: CancellationToken,
    collector: Collector,
}

impl ProfileStage {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        allowed_domains: Vec<String>,
        workers: usize,
        cancel: CancellationToken,
        collector: Collector,
    ) -> Self {
        Self {
            fetcher,
            allowed_domains: Arc::new(allowed_domains),
            workers: workers.max(1),
            cancel,
            collector,
        }
    }

    /// Visits one profile link and appends what it finds to the collector
    pub async fn visit(&self, link: &CompanyLink) -> ProfileOutcome {
        let url = match resolve_link(&link.source, &link.href) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Skipping profile link '{}': {}", link.href, e);
                return ProfileOutcome::Skipped;
            }
        };

        let allowed = extract_domain(&url)
            .map(|domain| is_allowed_domain(&self.allowed_domains, &domain))
            .unwrap_or(false);
        if !allowed {
            tracing::debug!("Skipping profile link outside allowed domains: {}", url);
            return ProfileOutcome::Skipped;
        }

        match self.fetcher.fetch(url.as_str()).await {
            Ok(body) => {
                let company_urls = extract_company_urls(&body);
                for company_url in &company_urls {
                    tracing::debug!("Company URL: {}", company_url);
                }
                self.collector.extend(company_urls.iter().cloned());
                ProfileOutcome::Found(company_urls)
            }
            Err(FetchError::Cancelled { .. }) => ProfileOutcome::Cancelled,
            Err(e) => {
                tracing::warn!("Profile {} dropped: {}", url, e);
                ProfileOutcome::Failed
            }
        }
    }

    /// Runs the worker pool until the queue closes or the run is cancelled
    pub async fn run(
        self,
        queue: mpsc::Receiver<CompanyLink>,
        progress: Arc<Progress>,
    ) -> Result<ProfileReport, HarvestError> {
        tracing::info!("Profile stage: {} workers", self.workers);

        let queue = Arc::new(Mutex::new(queue));
        let mut handles = Vec::with_capacity(self.workers);

        for worker_id in 0..self.workers {
            let stage = self.clone();
            let queue = queue.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                stage.worker(worker_id, queue, progress).await
            }));
        }
        drop(queue);

        let mut report = ProfileReport::default();
        let mut crashed = None;
        for handle in handles {
            match handle.await {
                Ok(worker_report) => report += worker_report,
                Err(e) => {
                    tracing::error!("Profile worker crashed: {}", e);
                    crashed.get_or_insert(e);
                }
            }
        }
        if let Some(e) = crashed {
            return Err(e.into());
        }

        tracing::info!(
            "Profile stage done: {} profiles fetched, {} failed, {} company URLs",
            report.profiles_fetched,
            report.profiles_failed,
            report.urls_found
        );

        Ok(report)
    }

    async fn worker(
        &self,
        worker_id: usize,
        queue: Arc<Mutex<mpsc::Receiver<CompanyLink>>>,
        progress: Arc<Progress>,
    ) -> ProfileReport {
        let mut report = ProfileReport::default();

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = async { queue.lock().await.recv().await } => next,
            };
            let Some(link) = next else {
                break;
            };

            match self.visit(&link).await {
                ProfileOutcome::Found(urls) => {
                    report.profiles_fetched += 1;
                    if urls.is_empty() {
                        report.profiles_without_url += 1;
                    }
                    report.urls_found += urls.len() as u64;
                }
                ProfileOutcome::Skipped => report.links_skipped += 1,
                ProfileOutcome::Failed => report.profiles_failed += 1,
                ProfileOutcome::Cancelled => break,
            }

            progress.tick();
        }

        if self.cancel.is_cancelled() {
            tracing::debug!("Profile worker {} stopping: cancelled", worker_id);
        }
        report
    }
}
