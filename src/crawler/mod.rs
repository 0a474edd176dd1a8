//! Crawler module for the harvest pipeline
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching, retry policy and per-domain rate limiting
//! - HTML selectors for listing rows and profile pages
//! - The listing, profile and email extraction worker pools
//! - Cancellation and overall run coordination

mod cancel;
mod collector;
mod coordinator;
mod emails;
mod fetcher;
mod limiter;
mod listing;
mod parser;
mod profile;

pub use cancel::cancel_after;
pub use collector::{dedupe_preserving_order, Collector};
pub use coordinator::{run_harvest, Coordinator, HarvestOutcome};
pub use emails::{EmailMatcher, ExtractionReport, ExtractionStage, EMAIL_PATTERN};
pub use fetcher::{build_http_client, FetchError, HttpFetcher, PageFetcher, RetryPolicy};
pub use limiter::{DispatchPermit, RateLimitedFetcher, RateLimiter};
pub use listing::{CompanyLink, ListingReport, ListingStage, PageOutcome};
pub use parser::{
    extract_company_links, extract_company_urls, LISTING_ROW_SELECTOR, PROFILE_COLUMN_SELECTOR,
};
pub use profile::{ProfileOutcome, ProfileReport, ProfileStage};
