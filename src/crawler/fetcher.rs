//! HTTP fetcher implementation
//!
//! This module handles all HTTP requests for the crawler, including:
//! - Building the HTTP client with the configured user agent and timeout
//! - GET requests returning the raw page body
//! - Error classification (timeout, HTTP status, network)
//! - The bounded retry policy applied by the rate-limited wrapper

use crate::config::FetcherConfig;
use crate::UrlError;
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;

/// Upper bound for a single retry backoff
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Why a single fetch failed
///
/// Fetch failures are scoped to one page: stages log them, count them and
/// move on to the next page.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Invalid URL {url}: {source}")]
    InvalidUrl { url: String, source: UrlError },

    #[error("Fetch of {url} cancelled")]
    Cancelled { url: String },
}

impl FetchError {
    /// The URL whose fetch failed
    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Network { url, .. }
            | Self::InvalidUrl { url, .. }
            | Self::Cancelled { url } => url,
        }
    }

    /// Whether another attempt could plausibly succeed
    ///
    /// | Failure | Retry |
    /// |---------|-------|
    /// | Timeout | yes |
    /// | Network | yes |
    /// | HTTP 5xx, 429 | yes |
    /// | Other HTTP status | no |
    /// | Invalid URL, cancelled | no |
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Network { .. } => true,
            Self::Status { status, .. } => *status >= 500 || *status == 429,
            Self::InvalidUrl { .. } | Self::Cancelled { .. } => false,
        }
    }
}

/// Retrieves raw page bodies
///
/// Every crawl stage depends only on this trait, so the rate limiter can wrap
/// any implementation and tests can substitute scripted fetchers.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url` and returns its body, or a classified failure
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Builds an HTTP client with proper configuration
///
/// # Arguments
///
/// * `config` - The fetcher configuration (user agent, request timeout)
///
/// # Example
///
/// ```no_run
/// use directory_harvester::config::FetcherConfig;
/// use directory_harvester::crawler::build_http_client;
///
/// let client = build_http_client(&FetcherConfig::default()).unwrap();
/// ```
pub fn build_http_client(config: &FetcherConfig) -> Result<Client, reqwest::Error> {
    let timeout = Duration::from_millis(config.request_timeout_ms);

    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .gzip(true)
        .brotli(true)
        .build()
}

/// `PageFetcher` backed by a reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Builds a fetcher with its own client
    pub fn new(config: &FetcherConfig) -> Result<Self, reqwest::Error> {
        Ok(Self::from_client(build_http_client(config)?))
    }

    /// Wraps an existing client (clients share their connection pool)
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!("Visiting: {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|e| classify_error(url, e))
    }
}

/// Maps a transport error onto the fetch taxonomy
fn classify_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else if error.is_connect() {
        FetchError::Network {
            url: url.to_string(),
            message: "Connection refused".to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

/// Bounded retry with exponential backoff
///
/// `max_attempts == 1` reproduces the plain crawl behaviour where a failed
/// page is simply skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &FetcherConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// A policy that never retries
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_backoff: Duration::ZERO,
        }
    }

    /// Whether a failure on attempt `attempt` (1-based) may be retried
    pub fn should_retry(&self, attempt: u32, error: &FetchError) -> bool {
        attempt < self.max_attempts && error.is_retryable()
    }

    /// Backoff before attempt `attempt + 1`: base * 2^(attempt-1) plus up to 25% jitter
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let delay = self
            .base_backoff
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF);

        let jitter_range = delay.as_millis() as u64 / 4;
        delay + Duration::from_millis(fastrand::u64(0..=jitter_range))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}
