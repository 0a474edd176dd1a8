use url::Url;

/// Extracts the lowercase host of a URL, or `None` for host-less URLs
///
/// The rate limiter keys its per-domain slots on this value, so two URLs on
/// the same host always share one slot regardless of letter case or port.
///
/// ```
/// use url::Url;
/// use directory_harvester::url::extract_domain;
///
/// let url = Url::parse("https://WWW.Directory.org:8443/c/?page=2").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.directory.org".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Checks a domain against one pattern
///
/// `"example.com"` matches only itself; `"*.example.com"` matches the bare
/// domain and any subdomain depth beneath it.
pub fn matches_wildcard(pattern: &str, candidate: &str) -> bool {
    match pattern.strip_prefix("*.") {
        Some(base) => candidate == base || candidate.ends_with(&format!(".{}", base)),
        None => candidate == pattern,
    }
}

/// Checks whether a crawl stage may visit `domain`
///
/// An empty allow-list places no restriction on the crawl.
pub fn is_allowed_domain(allowed: &[String], domain: &str) -> bool {
    allowed.is_empty()
        || allowed
            .iter()
            .any(|pattern| matches_wildcard(pattern, domain))
}
