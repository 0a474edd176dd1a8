use serde::Deserialize;

/// Client signature the reference crawl identified itself with
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36 Edg/91.0.864.59";

/// Main configuration structure for Directory-Harvester
///
/// Every section is optional in the TOML file; missing sections fall back to
/// the reference crawl policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub fetcher: FetcherConfig,
    pub listing: ListingConfig,
    pub profile: ProfileConfig,
    pub extraction: ExtractionConfig,
    pub output: OutputConfig,
    pub run: RunConfig,
}

/// The directory being harvested
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Listing base URL; page `n` lives at `<base-url>?page=<n>`
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// First listing page (inclusive)
    #[serde(rename = "first-page")]
    pub first_page: u32,

    /// Last listing page (inclusive)
    #[serde(rename = "last-page")]
    pub last_page: u32,

    /// Domain patterns the listing and profile stages may visit
    /// (e.g., "example.com" or "*.example.com"). Empty allows any domain.
    #[serde(rename = "allowed-domains")]
    pub allowed_domains: Vec<String>,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.eworldtrade.com/c/".to_string(),
            first_page: 1,
            last_page: 1108,
            allowed_domains: vec![
                "eworldtrade.com".to_string(),
                "www.eworldtrade.com".to_string(),
            ],
        }
    }
}

impl SiteConfig {
    /// Number of listing pages in the configured range
    pub fn page_count(&self) -> u32 {
        if self.last_page < self.first_page {
            0
        } else {
            self.last_page - self.first_page + 1
        }
    }
}

/// HTTP client behaviour shared by every stage
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,

    /// Per-request timeout (milliseconds)
    #[serde(rename = "request-timeout-ms")]
    pub request_timeout_ms: u64,

    /// Total attempts per fetch; 1 disables retries
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts (milliseconds), doubled each retry
    #[serde(rename = "retry-backoff-ms")]
    pub retry_backoff_ms: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            request_timeout_ms: 15_000,
            max_attempts: 1,
            retry_backoff_ms: 2_000,
        }
    }
}

/// Per-domain throttling for one worker pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum simultaneous in-flight requests per domain (and worker count)
    pub concurrency: u32,

    /// Fixed delay between dispatches to the same domain (milliseconds)
    #[serde(rename = "delay-ms")]
    pub delay_ms: u64,

    /// Upper bound of the random extra delay added to `delay-ms` (milliseconds)
    #[serde(rename = "jitter-ms")]
    pub jitter_ms: u64,
}

impl RateLimitConfig {
    /// Reference policy for the directory itself: 2 in flight, 9s + up to 4s apart
    pub fn directory_default() -> Self {
        Self {
            concurrency: 2,
            delay_ms: 9_000,
            jitter_ms: 4_000,
        }
    }
}

/// Listing page pool
#[derive(Debug, Clone, Deserialize)]
pub struct ListingConfig {
    #[serde(flatten)]
    pub rate: RateLimitConfig,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            rate: RateLimitConfig::directory_default(),
        }
    }
}

/// Profile page pool
#[derive(Debug, Clone, Deserialize)]
pub struct ProfileConfig {
    #[serde(flatten)]
    pub rate: RateLimitConfig,

    /// Bound of the queue between the listing and profile stages
    #[serde(rename = "queue-capacity", default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Drop repeated company URLs, keeping the first occurrence
    #[serde(default)]
    pub dedupe: bool,
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            rate: RateLimitConfig::directory_default(),
            queue_capacity: default_queue_capacity(),
            dedupe: false,
        }
    }
}

/// Email extraction pass over company websites
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractionConfig {
    #[serde(flatten)]
    pub rate: RateLimitConfig,

    /// Matches containing any of these substrings are discarded (case-sensitive)
    #[serde(rename = "reject-substrings", default = "default_reject_substrings")]
    pub reject_substrings: Vec<String>,

    /// Drop repeated addresses, keeping the first occurrence
    #[serde(default)]
    pub dedupe: bool,
}

fn default_reject_substrings() -> Vec<String> {
    vec!["address".to_string(), "example".to_string()]
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            rate: RateLimitConfig {
                concurrency: 1,
                delay_ms: 0,
                jitter_ms: 0,
            },
            reject_substrings: default_reject_substrings(),
            dedupe: false,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the JSON array of company URLs
    #[serde(rename = "links-path")]
    pub links_path: String,

    /// Path of the single-column emails CSV
    #[serde(rename = "emails-path")]
    pub emails_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            links_path: "links.json".to_string(),
            emails_path: "emails.csv".to_string(),
        }
    }
}

/// Whole-run limits
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Stop dispatching new fetches after this many seconds; 0 disables
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,
}
