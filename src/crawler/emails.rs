//! Email extraction stage
//!
//! Each company URL is fetched independently and the raw body is scanned for
//! email-shaped tokens. Matches containing a placeholder marker are dropped.
//! A fixed pool of workers pulls URL positions from a shared cursor and files
//! each result under its position, so the output is concatenated in input
//! order no matter which fetch finishes first.

use crate::crawler::fetcher::{FetchError, PageFetcher};
use crate::output::Progress;
use crate::HarvestError;
use regex::Regex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// `local@domain.tld`-shaped tokens
pub const EMAIL_PATTERN: &str = r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b";

/// Email matcher with a placeholder filter
#[derive(Debug, Clone)]
pub struct EmailMatcher {
    pattern: Regex,
    reject_substrings: Vec<String>,
}

impl EmailMatcher {
    /// Builds a matcher rejecting any match that contains one of `reject_substrings`
    ///
    /// The comparison is case-sensitive.
    pub fn new(reject_substrings: Vec<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(EMAIL_PATTERN)?,
            reject_substrings,
        })
    }

    /// Whether `candidate` looks like a sample or placeholder address
    pub fn is_placeholder(&self, candidate: &str) -> bool {
        self.reject_substrings
            .iter()
            .any(|marker| candidate.contains(marker.as_str()))
    }

    /// All non-overlapping matches in `body`, in order, minus placeholders
    ///
    /// # Example
    ///
    /// ```
    /// use directory_harvester::crawler::EmailMatcher;
    ///
    /// let matcher = EmailMatcher::new(vec!["example".into(), "address".into()]).unwrap();
    /// let found = matcher.extract("Write to sales@acme-co.com or info@example.com");
    /// assert_eq!(found, vec!["sales@acme-co.com".to_string()]);
    /// ```
    pub fn extract(&self, body: &str) -> Vec<String> {
        self.pattern
            .find_iter(body)
            .map(|m| m.as_str())
            .filter(|candidate| !self.is_placeholder(candidate))
            .map(str::to_string)
            .collect()
    }
}

/// Counters for one extraction run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExtractionReport {
    pub urls_fetched: u64,
    pub urls_failed: u64,
    /// URLs never dispatched because the run was cancelled
    pub urls_cancelled: u64,
    pub emails_found: u64,
}

/// What happened to one company URL
enum UrlOutcome {
    Emails(Vec<String>),
    Failed,
    Cancelled,
}

/// Email extraction worker pool
#[derive(Clone)]
pub struct ExtractionStage {
    fetcher: Arc<dyn PageFetcher>,
    matcher: Arc<EmailMatcher>,
    workers: usize,
    cancel: CancellationToken,
}

impl ExtractionStage {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        matcher: EmailMatcher,
        workers: usize,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            fetcher,
            matcher: Arc::new(matcher),
            workers: workers.max(1),
            cancel,
        }
    }

    /// Fetches every URL and returns the emails found, grouped in input order
    ///
    /// A URL whose fetch fails is logged and contributes no emails; it never
    /// stops the remaining URLs. A crashed worker fails the stage, but only
    /// once every other worker has stopped.
    pub async fn run(
        &self,
        urls: &[String],
        progress: Arc<Progress>,
    ) -> Result<(Vec<String>, ExtractionReport), HarvestError> {
        tracing::info!(
            "Extraction stage: {} URLs with {} workers",
            urls.len(),
            self.workers
        );

        let urls = Arc::new(urls.to_vec());
        let cursor = Arc::new(AtomicUsize::new(0));
        let workers = self.workers.min(urls.len());
        let mut handles = Vec::with_capacity(workers);

        for worker_id in 0..workers {
            let stage = self.clone();
            let urls = urls.clone();
            let cursor = cursor.clone();
            let progress = progress.clone();

            handles.push(tokio::spawn(async move {
                stage.worker(worker_id, urls, cursor, progress).await
            }));
        }

        let mut slots: Vec<Option<UrlOutcome>> = urls.iter().map(|_| None).collect();
        let mut crashed = None;
        for handle in handles {
            match handle.await {
                Ok(outcomes) => {
                    for (index, outcome) in outcomes {
                        slots[index] = Some(outcome);
                    }
                }
                Err(e) => {
                    tracing::error!("Extraction worker crashed: {}", e);
                    crashed.get_or_insert(e);
                }
            }
        }
        if let Some(e) = crashed {
            return Err(e.into());
        }

        let mut emails = Vec::new();
        let mut report = ExtractionReport::default();

        for slot in slots {
            match slot {
                Some(UrlOutcome::Emails(found)) => {
                    report.urls_fetched += 1;
                    report.emails_found += found.len() as u64;
                    emails.extend(found);
                }
                Some(UrlOutcome::Failed) => report.urls_failed += 1,
                // `None`: never handed out before the run was cancelled
                Some(UrlOutcome::Cancelled) | None => report.urls_cancelled += 1,
            }
        }

        tracing::info!(
            "Extraction stage done: {} URLs fetched, {} failed, {} emails",
            report.urls_fetched,
            report.urls_failed,
            report.emails_found
        );

        Ok((emails, report))
    }

    async fn worker(
        &self,
        worker_id: usize,
        urls: Arc<Vec<String>>,
        cursor: Arc<AtomicUsize>,
        progress: Arc<Progress>,
    ) -> Vec<(usize, UrlOutcome)> {
        let mut outcomes = Vec::new();

        loop {
            if self.cancel.is_cancelled() {
                tracing::debug!("Extraction worker {} stopping: cancelled", worker_id);
                break;
            }

            let index = cursor.fetch_add(1, Ordering::SeqCst);
            let Some(url) = urls.get(index) else {
                break;
            };

            let outcome = self.extract_from(url).await;
            let cancelled = matches!(outcome, UrlOutcome::Cancelled);
            outcomes.push((index, outcome));
            if cancelled {
                break;
            }

            progress.tick();
        }

        outcomes
    }

    async fn extract_from(&self, url: &str) -> UrlOutcome {
        if self.cancel.is_cancelled() {
            return UrlOutcome::Cancelled;
        }

        match self.fetcher.fetch(url).await {
            Ok(body) => {
                let found = self.matcher.extract(&body);
                tracing::debug!("{} email(s) on {}", found.len(), url);
                UrlOutcome::Emails(found)
            }
            Err(FetchError::Cancelled { .. }) => UrlOutcome::Cancelled,
            Err(e) => {
                tracing::warn!("Error scraping emails from {}: {}", url, e);
                UrlOutcome::Failed
            }
        }
    }
}
