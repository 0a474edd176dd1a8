//! Configuration module for Directory-Harvester
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! A missing file section falls back to the reference crawl policy, so an empty
//! file (or no file at all) describes a complete run.
//!
//! # Example
//!
//! ```no_run
//! use directory_harvester::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Listing pages: {}", config.site.page_count());
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, ExtractionConfig, FetcherConfig, ListingConfig, OutputConfig, ProfileConfig,
    RateLimitConfig, RunConfig, SiteConfig, DEFAULT_USER_AGENT,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
