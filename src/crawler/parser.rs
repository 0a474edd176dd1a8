//! HTML selectors for directory pages
//!
//! Listing pages hold one result row per company; profile pages hold a link
//! to the company's own website. Both are read the same way: find every
//! container matching a structural selector and take the `href` of its first
//! anchor. A page without matching containers simply yields nothing.

use scraper::{Html, Selector};

/// Result row on a listing page, narrowed to the flex box holding the profile link
pub const LISTING_ROW_SELECTOR: &str = "div.buyer-listing-result-row div.com-flex";

/// Main 8-wide column of a profile page, holding the company website link
pub const PROFILE_COLUMN_SELECTOR: &str = "div.row > div.col-lg-8";

/// Extracts profile-link hrefs from a listing page, in document order
///
/// # Example
///
/// ```
/// use directory_harvester::crawler::extract_company_links;
///
/// let html = r#"<div class="buyer-listing-result-row"><div class="com-flex"><a href="/c/acme">Acme</a></div></div>"#;
/// assert_eq!(extract_company_links(html), vec!["/c/acme".to_string()]);
/// ```
pub fn extract_company_links(html: &str) -> Vec<String> {
    extract_first_child_hrefs(html, LISTING_ROW_SELECTOR)
}

/// Extracts company-website hrefs from a profile page, in document order
pub fn extract_company_urls(html: &str) -> Vec<String> {
    extract_first_child_hrefs(html, PROFILE_COLUMN_SELECTOR)
}

/// For every element matching `container`, returns the href of its first `a[href]`
///
/// Containers without an anchor, or whose href is blank, contribute nothing.
fn extract_first_child_hrefs(html: &str, container: &str) -> Vec<String> {
    let (Ok(container_selector), Ok(anchor_selector)) =
        (Selector::parse(container), Selector::parse("a[href]"))
    else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    document
        .select(&container_selector)
        .filter_map(|element| {
            element
                .select(&anchor_selector)
                .next()
                .and_then(|anchor| anchor.value().attr("href"))
                .map(str::trim)
                .filter(|href| !href.is_empty())
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selectors_parse() {
        assert!(Selector::parse(LISTING_ROW_SELECTOR).is_ok());
        assert!(Selector::parse(PROFILE_COLUMN_SELECTOR).is_ok());
    }

    #[test]
    fn test_single_listing_row() {
        let html = r#"<div class="buyer-listing-result-row"><div class="com-flex"><a href="/c/acme">Acme</a></div></div>"#;
        assert_eq!(extract_company_links(html), vec!["/c/acme"]);
    }

    #[test]
    fn test_listing_rows_in_document_order() {
        let html = r#"
            <html><body>
            <div class="buyer-listing-result-row"><div class="com-flex"><a href="/c/first">1</a></div></div>
            <div class="buyer-listing-result-row"><div class="com-flex"><a href="/c/second">2</a></div></div>
            <div class="buyer-listing-result-row">
                <div class="logo"><img src="/x.png"></div>
                <div class="com-flex"><span><a href="https://www.eworldtrade.com/c/third">3</a></span></div>
            </div>
            </body></html>
        "#;
        assert_eq!(
            extract_company_links(html),
            vec![
                "/c/first",
                "/c/second",
                "https://www.eworldtrade.com/c/third"
            ]
        );
    }

    #[test]
    fn test_listing_row_takes_first_anchor_only() {
        let html = r#"<div class="buyer-listing-result-row"><div class="com-flex">
            <a href="/c/acme">Acme</a><a href="/c/acme/contact">Contact</a>
        </div></div>"#;
        assert_eq!(extract_company_links(html), vec!["/c/acme"]);
    }

    #[test]
    fn test_listing_ignores_flex_outside_result_rows() {
        let html = r#"
            <div class="com-flex"><a href="/c/sponsored">Ad</a></div>
            <div class="buyer-listing-result-row"><div class="com-flex"><a href="/c/acme">Acme</a></div></div>
        "#;
        assert_eq!(extract_company_links(html), vec!["/c/acme"]);
    }

    #[test]
    fn test_listing_row_without_anchor_is_skipped() {
        let html = r#"
            <div class="buyer-listing-result-row"><div class="com-flex">No link here</div></div>
            <div class="buyer-listing-result-row"><div class="com-flex"><a href="  ">Blank</a></div></div>
        "#;
        assert!(extract_company_links(html).is_empty());
    }

    #[test]
    fn test_listing_without_rows() {
        assert!(extract_company_links("<html><body><p>No results</p></body></html>").is_empty());
        assert!(extract_company_links("").is_empty());
    }

    #[test]
    fn test_profile_company_url() {
        let html = r#"<div class="row"><div class="col-lg-8"><a href="https://site/c/acme-co">Acme Co</a></div></div>"#;
        assert_eq!(extract_company_urls(html), vec!["https://site/c/acme-co"]);
    }

    #[test]
    fn test_profile_column_must_be_direct_child_of_row() {
        let html = r#"<div class="row"><section><div class="col-lg-8"><a href="https://acme.com">Acme</a></div></section></div>"#;
        assert!(extract_company_urls(html).is_empty());
    }

    #[test]
    fn test_profile_without_column() {
        let html = r#"<div class="row"><div class="col-lg-4"><a href="https://acme.com">Acme</a></div></div>"#;
        assert!(extract_company_urls(html).is_empty());
    }

    #[test]
    fn test_profile_nested_anchor() {
        let html = r#"<div class="container"><div class="row"><div class="col-lg-8 main">
            <h1>Acme Co</h1><p>Website: <a class="site" href="https://acme-co.com">acme-co.com</a></p>
        </div></div></div>"#;
        assert_eq!(extract_company_urls(html), vec!["https://acme-co.com"]);
    }
}
