use crate::config::types::{Config, FetcherConfig, OutputConfig, RateLimitConfig, SiteConfig};
use crate::url::{extract_domain, is_allowed_domain};
use crate::ConfigError;
use std::path::Path;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_fetcher_config(&config.fetcher)?;
    validate_rate_limit("listing", &config.listing.rate)?;
    validate_rate_limit("profile", &config.profile.rate)?;
    validate_rate_limit("extraction", &config.extraction.rate)?;

    if config.profile.queue_capacity < 1 {
        return Err(ConfigError::Validation(
            "profile queue_capacity must be >= 1".to_string(),
        ));
    }

    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates the site section
fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    let base = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if base.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' has no host",
            config.base_url
        )));
    }

    if config.first_page < 1 {
        return Err(ConfigError::Validation(format!(
            "first_page must be >= 1, got {}",
            config.first_page
        )));
    }

    if config.last_page < config.first_page {
        return Err(ConfigError::Validation(format!(
            "last_page ({}) must be >= first_page ({})",
            config.last_page, config.first_page
        )));
    }

    for pattern in &config.allowed_domains {
        validate_domain_pattern(pattern)?;
    }

    // Listing pages are fetched from the base host
    let host = extract_domain(&base).unwrap_or_default();
    if !is_allowed_domain(&config.allowed_domains, &host) {
        return Err(ConfigError::Validation(format!(
            "base_url host '{}' is not in allowed_domains",
            host
        )));
    }

    Ok(())
}

/// Validates fetcher configuration
fn validate_fetcher_config(config: &FetcherConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.request_timeout_ms == 0 {
        return Err(ConfigError::Validation(
            "request_timeout_ms must be > 0".to_string(),
        ));
    }

    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    Ok(())
}

/// Validates one worker pool's throttling policy
fn validate_rate_limit(stage: &str, config: &RateLimitConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "{} concurrency must be between 1 and 100, got {}",
            stage, config.concurrency
        )));
    }

    Ok(())
}

/// Validates output configuration
///
/// Output locations are checked up front so that an unwritable destination
/// fails the run before any network activity.
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    validate_output_path("links_path", &config.links_path)?;
    validate_output_path("emails_path", &config.emails_path)?;
    Ok(())
}

fn validate_output_path(name: &str, path: &str) -> Result<(), ConfigError> {
    if path.is_empty() {
        return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
    }

    let path = Path::new(path);
    if path.is_dir() {
        return Err(ConfigError::Validation(format!(
            "{} '{}' is a directory",
            name,
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.is_dir() {
            return Err(ConfigError::Validation(format!(
                "{} directory '{}' does not exist",
                name,
                parent.display()
            )));
        }
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    match pattern.strip_prefix("*.") {
        Some(domain) => validate_domain_string(domain),
        None => validate_domain_string(pattern),
    }
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    // "localhost" is the one dotless host worth allowing (local test servers)
    if !domain.contains('.') && domain != "localhost" {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' must contain at least one dot (e.g., 'example.com')",
            domain
        )));
    }

    Ok(())
}
