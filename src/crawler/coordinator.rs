//! Harvest coordinator - top-level run orchestration
//!
//! A run has two phases separated by a barrier:
//! 1. Discovery: the listing and profile pools run concurrently, connected by
//!    a bounded queue of profile links. Company URLs accumulate in a shared
//!    collector.
//! 2. Extraction: once both pools have finished, the collected URLs are
//!    written out and every company site is scanned for emails.
//!
//! Each pool fetches through its own rate limiter. Per-item failures stay
//! inside the stages; the coordinator only fails on configuration problems,
//! crashed workers, or sinks that could not be written. A crashed discovery
//! worker still lets both pools wind down and the URLs collected so far are
//! written before the error is returned.

use crate::config::{validate, Config, RateLimitConfig};
use crate::crawler::cancel::cancel_after;
use crate::crawler::collector::{dedupe_preserving_order, Collector};
use crate::crawler::emails::{EmailMatcher, ExtractionReport, ExtractionStage};
use crate::crawler::fetcher::{HttpFetcher, PageFetcher, RetryPolicy};
use crate::crawler::limiter::RateLimitedFetcher;
use crate::crawler::listing::{ListingReport, ListingStage};
use crate::crawler::profile::{ProfileReport, ProfileStage};
use crate::output::{read_links_json, FileSink, Progress, ResultSink, RunSummary, SinkFailures};
use crate::{ConfigError, HarvestError};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Everything a finished run produced
#[derive(Debug, Default)]
pub struct HarvestOutcome {
    /// Company URLs in collection order
    pub links: Vec<String>,

    /// Emails in extraction order
    pub emails: Vec<String>,

    pub summary: RunSummary,

    /// Sinks that could not be written; both were attempted
    pub sink_failures: SinkFailures,
}

impl HarvestOutcome {
    /// Turns sink failures into a run-level error
    pub fn into_result(mut self) -> Result<Self, HarvestError> {
        if self.sink_failures.is_empty() {
            Ok(self)
        } else {
            Err(HarvestError::Sinks(std::mem::take(&mut self.sink_failures)))
        }
    }
}

/// Result of the discovery phase
struct Discovery {
    links: Vec<String>,
    listing: ListingReport,
    profile: ProfileReport,
    /// First worker crash in either pool
    crashed: Option<HarvestError>,
}

/// Run-timeout timer, aborted when dropped
struct RunTimeout(Option<JoinHandle<()>>);

impl Drop for RunTimeout {
    fn drop(&mut self) {
        if let Some(timer) = self.0.take() {
            timer.abort();
        }
    }
}

/// Reads a pool's report, keeping the first failure aside
fn settle<T: Default>(
    joined: Result<Result<T, HarvestError>, tokio::task::JoinError>,
    crashed: &mut Option<HarvestError>,
) -> T {
    match joined.map_err(HarvestError::from).and_then(|result| result) {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Discovery pool failed: {}", e);
            crashed.get_or_insert(e);
            T::default()
        }
    }
}

/// Main harvest coordinator
pub struct Coordinator {
    config: Arc<Config>,
    base_url: Url,
    listing_fetcher: Arc<dyn PageFetcher>,
    profile_fetcher: Arc<dyn PageFetcher>,
    extraction_fetcher: Arc<dyn PageFetcher>,
    sink: Arc<dyn ResultSink>,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a coordinator fetching over HTTP and writing the configured files
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the HTTP client cannot be built.
    pub fn new(config: Config) -> Result<Self, HarvestError> {
        let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpFetcher::new(&config.fetcher)?);
        let sink: Arc<dyn ResultSink> = Arc::new(FileSink::new(
            config.output.links_path.clone(),
            config.output.emails_path.clone(),
        ));
        Self::with_parts(config, fetcher, sink)
    }

    /// Creates a coordinator around an arbitrary fetcher and sink
    ///
    /// The fetcher is wrapped in one rate limiter per pool, each with that
    /// pool's policy.
    pub fn with_parts(
        config: Config,
        fetcher: Arc<dyn PageFetcher>,
        sink: Arc<dyn ResultSink>,
    ) -> Result<Self, HarvestError> {
        validate(&config)?;

        let base_url = Url::parse(&config.site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

        let retry = RetryPolicy::from_config(&config.fetcher);
        let cancel = CancellationToken::new();
        let limited = |rate: RateLimitConfig| -> Arc<dyn PageFetcher> {
            Arc::new(RateLimitedFetcher::new(
                fetcher.clone(),
                rate,
                retry,
                cancel.clone(),
            ))
        };

        Ok(Self {
            listing_fetcher: limited(config.listing.rate),
            profile_fetcher: limited(config.profile.rate),
            extraction_fetcher: limited(config.extraction.rate),
            config: Arc::new(config),
            base_url,
            sink,
            cancel,
        })
    }

    /// Token that stops the run when tripped
    ///
    /// Tripping it wakes every worker and fetcher waiting on a throttle,
    /// queue, or retry backoff; none of them dispatches afterwards.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the full pipeline: discovery, links file, extraction, emails file
    pub async fn run(&self) -> Result<HarvestOutcome, HarvestError> {
        tracing::info!(
            "Starting harvest of {} (pages {}..={})",
            self.base_url,
            self.config.site.first_page,
            self.config.site.last_page
        );

        let mut summary = RunSummary::start();
        let _timeout = self.start_run_timeout();
        let mut sink_failures = SinkFailures::default();

        let discovery = self.discover_company_urls().await;
        summary.listing = discovery.listing;
        summary.profile = discovery.profile;
        let links = discovery.links;

        match self.sink.write_links(&links) {
            Ok(()) => summary.links_written = links.len() as u64,
            Err(e) => {
                tracing::error!("Failed to write company URLs: {}", e);
                sink_failures.links = Some(e);
            }
        }

        if let Some(e) = discovery.crashed {
            return Err(e);
        }

        let (emails, extraction) = self.harvest_emails(&links).await?;
        summary.extraction = extraction;

        match self.sink.write_emails(&emails) {
            Ok(()) => summary.emails_written = emails.len() as u64,
            Err(e) => {
                tracing::error!("Failed to write emails: {}", e);
                sink_failures.emails = Some(e);
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        summary.finish();

        tracing::info!(
            "Harvest completed: {} company URLs, {} emails",
            links.len(),
            emails.len()
        );

        Ok(HarvestOutcome {
            links,
            emails,
            summary,
            sink_failures,
        })
    }

    /// Runs only the extraction phase over a links file from a previous run
    ///
    /// An unreadable links file is a hard error, since there is nothing to
    /// extract from.
    pub async fn run_emails_only(&self) -> Result<HarvestOutcome, HarvestError> {
        let links_path = Path::new(&self.config.output.links_path);
        tracing::info!("Reading company URLs from {}", links_path.display());
        let links = read_links_json(links_path)?;

        let mut summary = RunSummary::start();
        let _timeout = self.start_run_timeout();
        let mut sink_failures = SinkFailures::default();

        let (emails, extraction) = self.harvest_emails(&links).await?;
        summary.extraction = extraction;

        match self.sink.write_emails(&emails) {
            Ok(()) => summary.emails_written = emails.len() as u64,
            Err(e) => {
                tracing::error!("Failed to write emails: {}", e);
                sink_failures.emails = Some(e);
            }
        }

        summary.cancelled = self.cancel.is_cancelled();
        summary.finish();

        Ok(HarvestOutcome {
            links,
            emails,
            summary,
            sink_failures,
        })
    }

    /// Runs the listing and profile pools to completion
    ///
    /// Returns only after every worker of both pools has exited, so the
    /// collected URLs are final. A failed pool never leaves the other one
    /// running; its error comes back in `Discovery::crashed`.
    async fn discover_company_urls(&self) -> Discovery {
        let site = &self.config.site;
        let collector = Collector::new();
        let (queue_tx, queue_rx) = mpsc::channel(self.config.profile.queue_capacity);

        let listing = ListingStage::new(
            self.listing_fetcher.clone(),
            self.base_url.clone(),
            site.first_page,
            site.last_page,
            self.config.listing.rate.concurrency as usize,
            self.cancel.clone(),
        );
        let profile = ProfileStage::new(
            self.profile_fetcher.clone(),
            site.allowed_domains.clone(),
            self.config.profile.rate.concurrency as usize,
            self.cancel.clone(),
            collector.clone(),
        );

        let listing_progress = Arc::new(Progress::new("Listing", listing.page_count()));
        let profile_progress = Arc::new(Progress::unbounded("Profiles"));

        let listing_task = tokio::spawn(listing.run(queue_tx, listing_progress));
        let profile_task = tokio::spawn(profile.run(queue_rx, profile_progress));

        // Both handles are awaited before either error is looked at
        let listing_joined = listing_task.await;
        let profile_joined = profile_task.await;

        let mut crashed = None;
        let listing_report = settle(listing_joined, &mut crashed);
        let profile_report = settle(profile_joined, &mut crashed);

        let mut links = collector.take();
        if self.config.profile.dedupe {
            let before = links.len();
            links = dedupe_preserving_order(links);
            tracing::info!("Removed {} duplicate company URLs", before - links.len());
        }

        Discovery {
            links,
            listing: listing_report,
            profile: profile_report,
            crashed,
        }
    }

    /// Scans every company URL for emails, in input order
    async fn harvest_emails(
        &self,
        urls: &[String],
    ) -> Result<(Vec<String>, ExtractionReport), HarvestError> {
        let extraction = &self.config.extraction;
        let matcher = EmailMatcher::new(extraction.reject_substrings.clone())?;
        let stage = ExtractionStage::new(
            self.extraction_fetcher.clone(),
            matcher,
            extraction.rate.concurrency as usize,
            self.cancel.clone(),
        );

        let progress = Arc::new(Progress::new("Emails", urls.len() as u64));
        let (mut emails, report) = stage.run(urls, progress).await?;

        if extraction.dedupe {
            let before = emails.len();
            emails = dedupe_preserving_order(emails);
            tracing::info!("Removed {} duplicate emails", before - emails.len());
        }

        Ok((emails, report))
    }

    fn start_run_timeout(&self) -> RunTimeout {
        match self.config.run.timeout_secs {
            0 => RunTimeout(None),
            secs => RunTimeout(Some(cancel_after(&self.cancel, Duration::from_secs(secs)))),
        }
    }
}

/// Runs a complete harvest with the HTTP fetcher and file sinks
///
/// # Example
///
/// ```no_run
/// use directory_harvester::config::load_config;
/// use directory_harvester::crawler::run_harvest;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("harvest.toml"))?;
/// let outcome = run_harvest(config).await?;
/// println!("{} emails", outcome.emails.len());
/// # Ok(())
/// # }
/// ```
pub async fn run_harvest(config: Config) -> Result<HarvestOutcome, HarvestError> {
    let coordinator = Coordinator::new(config)?;
    coordinator.run().await?.into_result()
}
