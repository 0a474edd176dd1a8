//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the directory and the company
//! websites, and run the pipeline end-to-end against it.

use async_trait::async_trait;
use directory_harvester::config::{Config, FetcherConfig, RateLimitConfig};
use directory_harvester::crawler::{
    Coordinator, FetchError, HttpFetcher, ListingStage, PageFetcher, RateLimitedFetcher,
    RetryPolicy,
};
use directory_harvester::output::{read_links_json, Progress};
use directory_harvester::{CancellationToken, HarvestError};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Single-worker, unthrottled pools so results arrive in a fixed order
fn harvest_config(server_uri: &str, out_dir: &Path, last_page: u32) -> Config {
    let mut config = Config::default();
    config.site.base_url = format!("{}/c/", server_uri);
    config.site.first_page = 1;
    config.site.last_page = last_page;
    config.site.allowed_domains = vec!["127.0.0.1".to_string()];
    config.fetcher.request_timeout_ms = 5_000;

    let sequential = RateLimitConfig {
        concurrency: 1,
        delay_ms: 0,
        jitter_ms: 0,
    };
    config.listing.rate = sequential;
    config.profile.rate = sequential;
    config.extraction.rate = sequential;

    config.output.links_path = out_dir.join("links.json").display().to_string();
    config.output.emails_path = out_dir.join("emails.csv").display().to_string();
    config
}

fn listing_page(hrefs: &[&str]) -> String {
    let rows: String = hrefs
        .iter()
        .map(|href| {
            format!(
                r#"<div class="buyer-listing-result-row">
                     <div class="com-flex"><a href="{}">Company</a><a href="/ignored">More</a></div>
                   </div>"#,
                href
            )
        })
        .collect();
    format!("<html><body><div class=\"results\">{}</div></body></html>", rows)
}

fn profile_page(company_url: &str) -> String {
    format!(
        r#"<html><body><div class="row">
             <div class="col-lg-8"><a href="{}">Visit website</a></div>
             <div class="col-lg-4"><a href="/c/contact">Contact</a></div>
           </div></body></html>"#,
        company_url
    )
}

async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path("/c/"))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, at: &str, template: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(at))
        .respond_with(template)
        .mount(server)
        .await;
}

fn html(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body.into())
        .insert_header("content-type", "text/html")
}

#[tokio::test]
async fn test_full_harvest_writes_both_files() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let out = TempDir::new().unwrap();

    mount_listing(&server, 1, listing_page(&["/c/acme", "/c/globex"])).await;
    mount_listing(&server, 2, listing_page(&["/c/initech"])).await;

    mount_page(&server, "/c/acme", html(profile_page(&format!("{}/sites/acme", uri)))).await;
    mount_page(&server, "/c/globex", html(profile_page(&format!("{}/sites/globex", uri)))).await;
    mount_page(&server, "/c/initech", html("<p>Profile without a website</p>")).await;

    mount_page(
        &server,
        "/sites/acme",
        html("Contact: sales@acme-co.com, or demo@example.com for samples"),
    )
    .await;
    mount_page(
        &server,
        "/sites/globex",
        html("<a href=\"mailto:hello@globex.net\">hello@globex.net</a> your.address@globex.net"),
    )
    .await;

    let config = harvest_config(&uri, out.path(), 2);
    let coordinator = Coordinator::new(config).expect("Failed to create coordinator");
    let outcome = coordinator
        .run()
        .await
        .expect("Harvest failed")
        .into_result()
        .expect("Sinks failed");

    let links_json = std::fs::read_to_string(out.path().join("links.json")).unwrap();
    assert_eq!(
        links_json,
        format!(r#"["{uri}/sites/acme","{uri}/sites/globex"]"#, uri = uri)
    );

    let emails_csv = std::fs::read_to_string(out.path().join("emails.csv")).unwrap();
    assert_eq!(
        emails_csv,
        "Emails\nsales@acme-co.com\nhello@globex.net\nhello@globex.net\n"
    );

    let summary = &outcome.summary;
    assert_eq!(summary.listing.pages_fetched, 2);
    assert_eq!(summary.listing.links_found, 3);
    assert_eq!(summary.profile.profiles_fetched, 3);
    assert_eq!(summary.profile.profiles_without_url, 1);
    assert_eq!(summary.extraction.urls_fetched, 2);
    assert_eq!(summary.emails_written, 3);
}

#[tokio::test]
async fn test_failed_pages_are_skipped() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let out = TempDir::new().unwrap();

    mount_listing(&server, 1, listing_page(&["/c/acme"])).await;
    Mock::given(method("GET"))
        .and(path("/c/"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_listing(&server, 3, listing_page(&["/c/broken", "/c/globex"])).await;

    mount_page(&server, "/c/acme", html(profile_page(&format!("{}/sites/down", uri)))).await;
    mount_page(&server, "/c/broken", ResponseTemplate::new(404)).await;
    mount_page(&server, "/c/globex", html(profile_page(&format!("{}/sites/globex", uri)))).await;

    mount_page(&server, "/sites/down", ResponseTemplate::new(503)).await;
    mount_page(&server, "/sites/globex", html("info@globex.net")).await;

    let config = harvest_config(&uri, out.path(), 3);
    let outcome = Coordinator::new(config)
        .unwrap()
        .run()
        .await
        .unwrap()
        .into_result()
        .unwrap();

    assert_eq!(
        outcome.links,
        vec![format!("{}/sites/down", uri), format!("{}/sites/globex", uri)]
    );
    assert_eq!(outcome.emails, vec!["info@globex.net"]);

    let summary = &outcome.summary;
    assert_eq!(summary.listing.pages_failed, 1);
    assert_eq!(summary.listing.pages_fetched, 2);
    assert_eq!(summary.profile.profiles_failed, 1);
    assert_eq!(summary.extraction.urls_failed, 1);
    assert!(!summary.cancelled);
}

#[tokio::test]
async fn test_slow_page_is_classified_as_timeout() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/slow",
        html("too late").set_delay(Duration::from_secs(3)),
    )
    .await;

    let fetcher = HttpFetcher::new(&FetcherConfig {
        request_timeout_ms: 200,
        ..FetcherConfig::default()
    })
    .unwrap();

    let url = format!("{}/slow", server.uri());
    let result = fetcher.fetch(&url).await;

    assert_eq!(result, Err(FetchError::Timeout { url }));
}

#[tokio::test]
async fn test_non_success_status_is_reported() {
    let server = MockServer::start().await;
    mount_page(&server, "/gone", ResponseTemplate::new(410)).await;

    let fetcher = HttpFetcher::new(&FetcherConfig::default()).unwrap();
    let url = format!("{}/gone", server.uri());

    assert_eq!(
        fetcher.fetch(&url).await,
        Err(FetchError::Status { url, status: 410 })
    );
}

/// Counts simultaneous fetches and remembers the peak
struct CountingFetcher {
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
}

#[async_trait]
impl PageFetcher for CountingFetcher {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        self.calls.fetch_add(1, Ordering::SeqCst);

        tokio::time::sleep(Duration::from_millis(30)).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(String::new())
    }
}

#[tokio::test]
async fn test_domain_concurrency_cap_holds_with_more_workers() {
    let counter = Arc::new(CountingFetcher {
        in_flight: AtomicUsize::new(0),
        peak: AtomicUsize::new(0),
        calls: AtomicUsize::new(0),
    });
    let limited = RateLimitedFetcher::new(
        counter.clone(),
        RateLimitConfig {
            concurrency: 2,
            delay_ms: 0,
            jitter_ms: 0,
        },
        RetryPolicy::none(),
        CancellationToken::new(),
    );

    let stage = ListingStage::new(
        Arc::new(limited),
        url::Url::parse("https://dir.test.org/c/").unwrap(),
        1,
        10,
        5,
        CancellationToken::new(),
    );
    let (tx, _rx) = mpsc::channel(16);

    let report = stage
        .run(tx, Arc::new(Progress::new("Listing", 10)))
        .await
        .unwrap();

    assert_eq!(report.pages_fetched, 10);
    assert_eq!(counter.calls.load(Ordering::SeqCst), 10);
    assert!(counter.peak.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn test_requests_to_one_domain_are_spaced() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();
    for page in 1..=3 {
        mount_listing(&server, page, listing_page(&[])).await;
    }

    let mut config = harvest_config(&server.uri(), out.path(), 3);
    config.listing.rate.delay_ms = 150;

    let started = Instant::now();
    let outcome = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(outcome.summary.listing.pages_fetched, 3);
    assert_eq!(outcome.summary.listing.pages_without_rows, 3);
    assert!(started.elapsed() >= Duration::from_millis(300));
    assert!(outcome.links.is_empty());
}

#[tokio::test]
async fn test_links_sink_failure_still_writes_emails() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let out = TempDir::new().unwrap();
    let links_dir = out.path().join("links");
    std::fs::create_dir(&links_dir).unwrap();

    mount_listing(&server, 1, listing_page(&["/c/acme"])).await;
    mount_page(&server, "/c/acme", html(profile_page(&format!("{}/sites/acme", uri)))).await;
    mount_page(&server, "/sites/acme", html("sales@acme-co.com")).await;

    let mut config = harvest_config(&uri, out.path(), 1);
    config.output.links_path = links_dir.join("links.json").display().to_string();
    let coordinator = Coordinator::new(config).unwrap();

    // The links location disappears after validation
    std::fs::remove_dir(&links_dir).unwrap();

    let outcome = coordinator.run().await.unwrap();
    assert!(outcome.sink_failures.links.is_some());
    assert!(outcome.sink_failures.emails.is_none());

    let emails_csv = std::fs::read_to_string(out.path().join("emails.csv")).unwrap();
    assert_eq!(emails_csv, "Emails\nsales@acme-co.com\n");

    assert!(matches!(outcome.into_result(), Err(HarvestError::Sinks(_))));
}

#[tokio::test]
async fn test_emails_only_reads_previous_links() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let out = TempDir::new().unwrap();

    mount_page(&server, "/sites/acme", html("sales@acme-co.com")).await;
    mount_page(&server, "/sites/globex", html("hr@globex.net")).await;

    let config = harvest_config(&uri, out.path(), 1);
    std::fs::write(
        &config.output.links_path,
        format!(r#"["{uri}/sites/acme","{uri}/sites/globex"]"#, uri = uri),
    )
    .unwrap();

    let outcome = Coordinator::new(config.clone())
        .unwrap()
        .run_emails_only()
        .await
        .unwrap();

    assert_eq!(outcome.emails, vec!["sales@acme-co.com", "hr@globex.net"]);
    assert_eq!(outcome.summary.listing.pages_fetched, 0);

    // The links file is input here, never rewritten
    assert_eq!(
        read_links_json(Path::new(&config.output.links_path)).unwrap(),
        outcome.links
    );
    let emails_csv = std::fs::read_to_string(&config.output.emails_path).unwrap();
    assert_eq!(emails_csv, "Emails\nsales@acme-co.com\nhr@globex.net\n");
}

#[tokio::test]
async fn test_run_timeout_stops_dispatch() {
    let server = MockServer::start().await;
    let out = TempDir::new().unwrap();
    for page in 1..=50 {
        mount_listing(&server, page, listing_page(&[])).await;
    }

    let mut config = harvest_config(&server.uri(), out.path(), 50);
    config.listing.rate.delay_ms = 200;
    config.run.timeout_secs = 1;

    let outcome = Coordinator::new(config).unwrap().run().await.unwrap();

    assert!(outcome.summary.cancelled);
    assert!(outcome.summary.listing.pages_fetched < 50);
    assert!(out.path().join("links.json").exists());
    assert!(out.path().join("emails.csv").exists());
}

/// Records every dispatch, and how many happened after `cancel` tripped
struct DispatchRecorder {
    cancel: CancellationToken,
    calls: AtomicUsize,
    after_cancel: AtomicUsize,
    response: Result<String, FetchError>,
}

impl DispatchRecorder {
    fn new(cancel: &CancellationToken, response: Result<String, FetchError>) -> Self {
        Self {
            cancel: cancel.clone(),
            calls: AtomicUsize::new(0),
            after_cancel: AtomicUsize::new(0),
            response,
        }
    }
}

#[async_trait]
impl PageFetcher for DispatchRecorder {
    async fn fetch(&self, _url: &str) -> Result<String, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.cancel.is_cancelled() {
            self.after_cancel.fetch_add(1, Ordering::SeqCst);
        }
        self.response.clone()
    }
}

fn cancel_in(cancel: &CancellationToken, after: Duration) -> tokio::task::JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(after).await;
        cancel.cancel();
    })
}

#[tokio::test]
async fn test_cancel_wakes_throttled_workers_without_dispatching() {
    let cancel = CancellationToken::new();
    let recorder = Arc::new(DispatchRecorder::new(&cancel, Ok(listing_page(&[]))));
    let limited = RateLimitedFetcher::new(
        recorder.clone(),
        RateLimitConfig {
            concurrency: 2,
            delay_ms: 400,
            jitter_ms: 0,
        },
        RetryPolicy::none(),
        cancel.clone(),
    );
    let stage = ListingStage::new(
        Arc::new(limited),
        url::Url::parse("https://dir.test.org/c/").unwrap(),
        1,
        5,
        2,
        cancel.clone(),
    );
    let (tx, _rx) = mpsc::channel(16);

    let trip = cancel_in(&cancel, Duration::from_millis(50));
    let started = Instant::now();
    let report = stage
        .run(tx, Arc::new(Progress::new("Listing", 5)))
        .await
        .unwrap();
    trip.await.unwrap();

    assert_eq!(recorder.after_cancel.load(Ordering::SeqCst), 0);
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(report.pages_fetched, 1);
    assert_eq!(report.pages_failed, 0);
    // The throttled worker woke on cancel instead of sleeping out its 400ms
    assert!(started.elapsed() < Duration::from_millis(350));
}

#[tokio::test]
async fn test_cancel_during_retry_backoff_dispatches_nothing() {
    let cancel = CancellationToken::new();
    let recorder = Arc::new(DispatchRecorder::new(
        &cancel,
        Err(FetchError::Timeout {
            url: "https://dir.test.org/c/?page=1".to_string(),
        }),
    ));
    let limited = RateLimitedFetcher::new(
        recorder.clone(),
        RateLimitConfig {
            concurrency: 1,
            delay_ms: 0,
            jitter_ms: 0,
        },
        RetryPolicy {
            max_attempts: 3,
            base_backoff: Duration::from_millis(200),
        },
        cancel.clone(),
    );

    let trip = cancel_in(&cancel, Duration::from_millis(50));
    let result = limited.fetch("https://dir.test.org/c/?page=1").await;
    trip.await.unwrap();

    assert!(matches!(result, Err(FetchError::Cancelled { .. })));
    assert_eq!(recorder.calls.load(Ordering::SeqCst), 1);
    assert_eq!(recorder.after_cancel.load(Ordering::SeqCst), 0);
}
