//! Scopus literature-search client.
//!
//! The batch planner drives DOI resolution off ranked search results. This
//! module provides the [`SearchProvider`] seam the planner consumes, the
//! Scopus implementation of it, and the query-building helpers for keyword,
//! exact-title, exact-DOI, and raw queries.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::user_agent;

/// Default Scopus search API base URL.
const DEFAULT_BASE_URL: &str = "https://api.elsevier.com/content/search/scopus";

/// Errors from the search collaborator.
#[derive(Debug, Error)]
pub enum SearchError {
    /// Non-2xx response; carries the HTTP status and raw body.
    #[error("Scopus API error HTTP {status}: {body}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: String,
    },

    /// Transport-level failure.
    #[error("network error: {source}")]
    Network {
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not valid Scopus JSON.
    #[error("unexpected Scopus response format: {source}")]
    Parse {
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP client construction failed.
    #[error("client error: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// One search-result entry, filtered and deduplicated by the planner.
#[derive(Debug, Clone, Serialize)]
pub struct CandidateEntry {
    /// Paper title (may be empty when the source omits it).
    pub title: String,
    /// DOI, when the entry carries one. Entries without a DOI are dropped by
    /// the planner (counted, not attempted).
    pub doi: Option<String>,
    /// Publication year, derived from the cover date.
    pub year: Option<String>,
    /// Source venue (journal/conference name).
    pub venue: String,
    /// Citation count.
    pub cited_by: u64,
    /// First-author display string.
    pub authors: String,
    /// Stable Scopus entry identifier.
    pub eid: String,
}

/// One page of search results.
#[derive(Debug, Clone)]
pub struct SearchPage {
    /// Total hits the service reports for the whole query.
    pub total: usize,
    /// Entries on this page, in rank order.
    pub entries: Vec<CandidateEntry>,
}

/// Ranked-search collaborator consumed by the batch planner.
///
/// Implemented by [`ScopusClient`] in production and by in-memory fakes in
/// planner tests.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Fetches one page of ranked results for `query`.
    async fn search(
        &self,
        query: &str,
        count: usize,
        start: usize,
        sort: &str,
    ) -> Result<SearchPage, SearchError>;
}

// ==================== Scopus API Response Types ====================

#[derive(Debug, Deserialize)]
pub(crate) struct ScopusResponse {
    #[serde(rename = "search-results")]
    pub search_results: ScopusResults,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScopusResults {
    /// Scopus reports the total as a decimal string.
    #[serde(rename = "opensearch:totalResults", default)]
    pub total_results: Option<String>,
    #[serde(default)]
    pub entry: Option<Vec<ScopusEntry>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ScopusEntry {
    #[serde(rename = "dc:title")]
    pub title: Option<String>,
    #[serde(rename = "prism:doi")]
    pub doi: Option<String>,
    #[serde(rename = "prism:coverDate")]
    pub cover_date: Option<String>,
    #[serde(rename = "prism:publicationName")]
    pub publication_name: Option<String>,
    #[serde(rename = "citedby-count")]
    pub citedby_count: Option<String>,
    #[serde(rename = "dc:creator")]
    pub creator: Option<String>,
    pub eid: Option<String>,
}

// ==================== ScopusClient ====================

/// Client for the Scopus search API.
#[derive(Debug, Clone)]
pub struct ScopusClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl ScopusClient {
    /// Creates a client for the production Scopus API.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Client`] if HTTP client construction fails.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, SearchError> {
        Self::build(api_key.into(), DEFAULT_BASE_URL.to_string(), timeout)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Client`] if HTTP client construction fails.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        Self::build(api_key.into(), base_url.into(), timeout)
    }

    fn build(api_key: String, base_url: String, timeout: Duration) -> Result<Self, SearchError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|source| SearchError::Client { source })?;
        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl SearchProvider for ScopusClient {
    async fn search(
        &self,
        query: &str,
        count: usize,
        start: usize,
        sort: &str,
    ) -> Result<SearchPage, SearchError> {
        debug!(query = %query, count, start, sort = %sort, "Calling Scopus API");

        let response = self
            .client
            .get(&self.base_url)
            .header("X-ELS-APIKey", &self.api_key)
            .header(ACCEPT, "application/json")
            .query(&[
                ("query", query),
                ("count", &count.to_string()),
                ("start", &start.to_string()),
                ("sort", sort),
            ])
            .send()
            .await
            .map_err(|source| SearchError::Network { source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SearchError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let raw: ScopusResponse = response
            .json()
            .await
            .map_err(|source| SearchError::Parse { source })?;
        Ok(extract_page(raw))
    }
}

/// Converts a raw Scopus response into a [`SearchPage`].
pub(crate) fn extract_page(raw: ScopusResponse) -> SearchPage {
    let total = raw
        .search_results
        .total_results
        .as_deref()
        .and_then(|t| t.parse().ok())
        .unwrap_or(0);

    let entries = raw
        .search_results
        .entry
        .unwrap_or_default()
        .into_iter()
        .map(|item| CandidateEntry {
            title: item.title.unwrap_or_default(),
            doi: normalize_doi(item.doi.as_deref()),
            year: item
                .cover_date
                .as_deref()
                // get() rejects short dates and non-boundary slices alike.
                .and_then(|d| d.get(..4))
                .map(str::to_string),
            venue: item.publication_name.unwrap_or_default(),
            cited_by: item
                .citedby_count
                .as_deref()
                .and_then(|c| c.parse().ok())
                .unwrap_or(0),
            authors: item.creator.unwrap_or_default(),
            eid: item.eid.unwrap_or_default(),
        })
        .collect();

    SearchPage { total, entries }
}

/// Normalizes a raw DOI field: trims, drops empty and "N/A" markers.
fn normalize_doi(raw: Option<&str>) -> Option<String> {
    let doi = raw?.trim();
    if doi.is_empty() || doi.eq_ignore_ascii_case("n/a") {
        return None;
    }
    Some(doi.to_string())
}

// ==================== Query Builders ====================

/// Builds a `TITLE-ABS-KEY("…")` keyword query.
#[must_use]
pub fn keywords_query(keywords: &str) -> String {
    format!(r#"TITLE-ABS-KEY("{}")"#, escape_quotes(keywords))
}

/// Builds an exact-title `TITLE("…")` query.
#[must_use]
pub fn title_query(title: &str) -> String {
    format!(r#"TITLE("{}")"#, escape_quotes(title))
}

/// Builds an exact-DOI `DOI(…)` query, quoting terms that contain spaces.
#[must_use]
pub fn doi_query(doi: &str) -> String {
    format!("DOI({})", quote_term(doi))
}

fn quote_term(term: &str) -> String {
    if term.chars().any(char::is_whitespace) {
        format!(r#""{}""#, escape_quotes(term))
    } else {
        term.to_string()
    }
}

fn escape_quotes(text: &str) -> String {
    text.replace('\\', r"\\").replace('"', r#"\""#)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_scopus_response_deserialize_full() {
        let json = serde_json::json!({
            "search-results": {
                "opensearch:totalResults": "1534",
                "entry": [{
                    "dc:title": "A Survey",
                    "prism:doi": "10.1000/abc",
                    "prism:coverDate": "2024-03-01",
                    "prism:publicationName": "Journal of Tests",
                    "citedby-count": "42",
                    "dc:creator": "Doe J.",
                    "eid": "2-s2.0-1"
                }]
            }
        });

        let page = extract_page(serde_json::from_value(json).unwrap());
        assert_eq!(page.total, 1534);
        assert_eq!(page.entries.len(), 1);
        let entry = &page.entries[0];
        assert_eq!(entry.title, "A Survey");
        assert_eq!(entry.doi.as_deref(), Some("10.1000/abc"));
        assert_eq!(entry.year.as_deref(), Some("2024"));
        assert_eq!(entry.venue, "Journal of Tests");
        assert_eq!(entry.cited_by, 42);
    }

    #[test]
    fn test_scopus_response_deserialize_minimal() {
        let json = serde_json::json!({"search-results": {}});
        let page = extract_page(serde_json::from_value(json).unwrap());
        assert_eq!(page.total, 0);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_extract_page_missing_doi_becomes_none() {
        let json = serde_json::json!({
            "search-results": {
                "opensearch:totalResults": "3",
                "entry": [
                    {"dc:title": "No DOI"},
                    {"dc:title": "Marker", "prism:doi": "N/A"},
                    {"dc:title": "Blank", "prism:doi": "  "}
                ]
            }
        });
        let page = extract_page(serde_json::from_value(json).unwrap());
        assert!(page.entries.iter().all(|e| e.doi.is_none()));
    }

    #[test]
    fn test_extract_page_multibyte_cover_date_yields_no_year() {
        // Fullwidth digits put the fourth byte inside a character; the year
        // must degrade to None instead of panicking on the slice.
        let json = serde_json::json!({
            "search-results": {
                "opensearch:totalResults": "1",
                "entry": [{"prism:doi": "10.1/a", "prism:coverDate": "２０２４-06-01"}]
            }
        });
        let page = extract_page(serde_json::from_value(json).unwrap());
        assert!(page.entries[0].year.is_none());
        assert_eq!(page.entries[0].doi.as_deref(), Some("10.1/a"));
    }

    #[test]
    fn test_extract_page_short_cover_date_yields_no_year() {
        let json = serde_json::json!({
            "search-results": {
                "opensearch:totalResults": "1",
                "entry": [{"prism:coverDate": "24"}]
            }
        });
        let page = extract_page(serde_json::from_value(json).unwrap());
        assert!(page.entries[0].year.is_none());
    }

    #[test]
    fn test_extract_page_bad_counts_default_to_zero() {
        let json = serde_json::json!({
            "search-results": {
                "opensearch:totalResults": "not-a-number",
                "entry": [{"citedby-count": "many"}]
            }
        });
        let page = extract_page(serde_json::from_value(json).unwrap());
        assert_eq!(page.total, 0);
        assert_eq!(page.entries[0].cited_by, 0);
    }

    #[test]
    fn test_keywords_query_escapes_quotes() {
        assert_eq!(
            keywords_query(r#"graph "neural" nets"#),
            r#"TITLE-ABS-KEY("graph \"neural\" nets")"#
        );
    }

    #[test]
    fn test_title_query() {
        assert_eq!(title_query("Attention Is All"), r#"TITLE("Attention Is All")"#);
    }

    #[test]
    fn test_doi_query_plain() {
        assert_eq!(doi_query("10.1000/abc"), "DOI(10.1000/abc)");
    }

    #[test]
    fn test_doi_query_quotes_spaced_terms() {
        assert_eq!(doi_query("10.1000/a b"), r#"DOI("10.1000/a b")"#);
    }
}
