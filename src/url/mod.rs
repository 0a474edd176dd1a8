//! URL handling module for Directory-Harvester
//!
//! This module maps listing page numbers to URLs, resolves hrefs found in
//! scraped markup, and decides which domains the crawl stages may visit.

mod domain;

use crate::{UrlError, UrlResult};
use url::Url;

pub use domain::{extract_domain, is_allowed_domain, matches_wildcard};

/// Builds the URL of listing page `page`
///
/// This is a pure function of its inputs: the page number replaces whatever
/// query the base URL carried, giving `<base>?page=<page>`.
///
/// # Example
///
/// ```
/// use directory_harvester::url::generate_page_url;
/// use url::Url;
///
/// let base = Url::parse("https://www.eworldtrade.com/c/").unwrap();
/// assert_eq!(
///     generate_page_url(&base, 42).as_str(),
///     "https://www.eworldtrade.com/c/?page=42"
/// );
/// ```
pub fn generate_page_url(base: &Url, page: u32) -> Url {
    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(Some(&format!("page={}", page)));
    url
}

/// Resolves an href scraped from `base` into an absolute http(s) URL
///
/// # Returns
///
/// * `Ok(Url)` - The absolute URL
/// * `Err(UrlError)` - The href is empty, unparsable, uses another scheme
///   (`mailto:`, `javascript:` ...) or has no host
pub fn resolve_link(base: &Url, href: &str) -> UrlResult<Url> {
    let href = href.trim();

    if href.is_empty() {
        return Err(UrlError::Parse("empty href".to_string()));
    }

    let mut resolved = base
        .join(href)
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if resolved.scheme() != "http" && resolved.scheme() != "https" {
        return Err(UrlError::InvalidScheme(resolved.scheme().to_string()));
    }

    if resolved.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    resolved.set_fragment(None);
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://www.eworldtrade.com/c/").unwrap()
    }

    #[test]
    fn test_generate_page_url() {
        assert_eq!(
            generate_page_url(&base(), 1).as_str(),
            "https://www.eworldtrade.com/c/?page=1"
        );
        assert_eq!(
            generate_page_url(&base(), 1108).as_str(),
            "https://www.eworldtrade.com/c/?page=1108"
        );
    }

    #[test]
    fn test_generate_page_url_is_pure() {
        let base = base();
        let first = generate_page_url(&base, 17);
        let second = generate_page_url(&base, 17);
        assert_eq!(first, second);
        assert_eq!(base.as_str(), "https://www.eworldtrade.com/c/");
    }

    #[test]
    fn test_generate_page_url_replaces_existing_query() {
        let base = Url::parse("https://dir.example.org/list?page=9#top").unwrap();
        assert_eq!(
            generate_page_url(&base, 3).as_str(),
            "https://dir.example.org/list?page=3"
        );
    }

    #[test]
    fn test_resolve_relative_profile_link() {
        let page = generate_page_url(&base(), 5);
        let resolved = resolve_link(&page, "/c/acme").unwrap();
        assert_eq!(resolved.as_str(), "https://www.eworldtrade.com/c/acme");
    }

    #[test]
    fn test_resolve_absolute_link() {
        let resolved = resolve_link(&base(), "https://acme-co.com/#contact").unwrap();
        assert_eq!(resolved.as_str(), "https://acme-co.com/");
    }

    #[test]
    fn test_resolve_rejects_other_schemes() {
        assert_eq!(
            resolve_link(&base(), "mailto:sales@acme.com"),
            Err(UrlError::InvalidScheme("mailto".to_string()))
        );
        assert!(matches!(
            resolve_link(&base(), "javascript:void(0)"),
            Err(UrlError::InvalidScheme(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_empty_href() {
        assert!(matches!(resolve_link(&base(), "   "), Err(UrlError::Parse(_))));
    }
}
