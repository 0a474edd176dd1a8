//! Directory-Harvester: a polite business-directory crawler
//!
//! This crate walks the listing pages of a paginated company directory,
//! follows every listing entry to its profile page, records each company's
//! own website and finally harvests contact email addresses from those
//! websites. Every fetch goes through a per-domain rate limiter, and a single
//! page failing never aborts the run.

pub mod config;
pub mod crawler;
pub mod output;
pub mod url;

use thiserror::Error;

/// Run-level error type for Directory-Harvester operations
///
/// Per-page failures never surface here; they are logged and counted by the
/// stage that hit them. Only configuration problems, sink failures and
/// crashed workers end a run with an error.
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Result sinks failed: {0}")]
    Sinks(output::SinkFailures),

    #[error("Invalid email pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid domain pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Directory-Harvester operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use crate::config::Config;
pub use crate::crawler::{run_harvest, HarvestOutcome};
pub use tokio_util::sync::CancellationToken;
pub use crate::url::{extract_domain, generate_page_url, resolve_link};
