//! PDF link discovery inside HTML landing pages.
//!
//! Many open-access locations point at a landing page rather than the PDF
//! itself. This module extracts a single candidate PDF link from such a page:
//! the `citation_pdf_url` meta tag when present, otherwise the first `href`
//! that ends in `.pdf` (optionally with a query string).

use std::sync::LazyLock;

use regex::Regex;

#[allow(clippy::expect_used)]
static CITATION_PDF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<meta[^>]+name=["']citation_pdf_url["'][^>]+content=["']([^"']+)["']"#)
        .expect("citation_pdf_url regex is valid") // Static pattern, safe to panic
});

#[allow(clippy::expect_used)]
static PDF_HREF_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)href=["']([^"']+\.pdf(?:\?[^"']*)?)["']"#)
        .expect("pdf href regex is valid") // Static pattern, safe to panic
});

/// Extracts a candidate PDF link from an HTML document, if any.
///
/// The returned link may be relative; callers resolve it against the page's
/// final URL.
#[must_use]
pub fn extract_pdf_link(html: &str) -> Option<String> {
    if let Some(caps) = CITATION_PDF_PATTERN.captures(html) {
        return Some(caps[1].to_string());
    }
    PDF_HREF_PATTERN
        .captures(html)
        .map(|caps| caps[1].to_string())
}
