//! Unpaywall open-access resolver.
//!
//! Looks up a DOI against the Unpaywall API and flattens its open-access
//! locations into an ordered, deduplicated list of candidate download URLs.
//! The API requires a contact email (free, no key needed).
//!
//! API documentation: <https://unpaywall.org/api/v2>

use std::time::Duration;

use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::user_agent;

/// Default Unpaywall API base URL.
const DEFAULT_BASE_URL: &str = "https://api.unpaywall.org/v2";

/// Errors from the Unpaywall lookup.
///
/// The `Display` forms are the stable error codes recorded in resolution
/// outcomes, so they must not change casually.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Non-2xx response; carries the HTTP status and raw body.
    #[error("unpaywall_http_{status}: {body}")]
    Http {
        /// The HTTP status code.
        status: u16,
        /// The raw response body.
        body: String,
    },

    /// Transport-level failure (DNS, connect, TLS, timeout).
    #[error("unpaywall_error: {source}")]
    Network {
        /// The underlying network error.
        #[source]
        source: reqwest::Error,
    },

    /// The response body was not valid Unpaywall JSON.
    #[error("unpaywall_error: {source}")]
    Parse {
        /// The underlying decode error.
        #[source]
        source: reqwest::Error,
    },

    /// HTTP client construction failed.
    #[error("unpaywall_client_error: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// An open-access location offering a direct PDF URL and/or a landing page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OaLocation {
    /// Direct link to the PDF, when the host exposes one.
    #[serde(default)]
    pub url_for_pdf: Option<String>,
    /// General landing-page URL for the location.
    #[serde(default)]
    pub url: Option<String>,
}

/// The Unpaywall record for a DOI.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OaRecord {
    /// Whether the paper has any open-access location.
    #[serde(default)]
    pub is_oa: bool,
    /// Paper title; may be missing or null.
    #[serde(default)]
    pub title: Option<String>,
    /// Unpaywall's preferred location, tried first.
    #[serde(default)]
    pub best_oa_location: Option<OaLocation>,
    /// All known locations, including the best one.
    #[serde(default)]
    pub oa_locations: Vec<OaLocation>,
}

/// Client for the Unpaywall metadata API.
#[derive(Debug, Clone)]
pub struct UnpaywallClient {
    client: Client,
    base_url: String,
    email: String,
}

impl UnpaywallClient {
    /// Creates a client for the production Unpaywall API.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Client`] if HTTP client construction fails.
    pub fn new(email: impl Into<String>, timeout: Duration) -> Result<Self, LookupError> {
        Self::build(email.into(), DEFAULT_BASE_URL.to_string(), timeout)
    }

    /// Creates a client with a custom base URL (for testing with wiremock).
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Client`] if HTTP client construction fails.
    pub fn with_base_url(
        email: impl Into<String>,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LookupError> {
        Self::build(email.into(), base_url.into(), timeout)
    }

    fn build(email: String, base_url: String, timeout: Duration) -> Result<Self, LookupError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|source| LookupError::Client { source })?;
        Ok(Self {
            client,
            base_url,
            email,
        })
    }

    /// Looks up the open-access record for `doi`.
    ///
    /// Performs a single `GET {base}/{doi}?email={email}` request. The email
    /// is required by the Unpaywall usage policy and passed through opaquely.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::Http`] for non-2xx responses (with status and
    /// body), [`LookupError::Network`] for transport failures, and
    /// [`LookupError::Parse`] when the body is not valid JSON.
    pub async fn lookup(&self, doi: &str) -> Result<OaRecord, LookupError> {
        let url = format!(
            "{}/{}?email={}",
            self.base_url,
            urlencoding::encode(doi),
            urlencoding::encode(&self.email)
        );
        debug!(api_url = %url, "Calling Unpaywall API");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| LookupError::Network { source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "Unpaywall API error");
            return Err(LookupError::Http {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|source| LookupError::Parse { source })
    }
}

/// Flattens an [`OaRecord`] into an ordered, deduplicated URL list.
///
/// Order is a priority, not a guarantee: the best location's direct-PDF URL
/// comes first, then its landing page, then each alternate location's pair.
/// Blank entries are skipped and repeats keep their first position.
#[must_use]
pub fn build_candidate_urls(record: &OaRecord) -> Vec<String> {
    let mut raw: Vec<Option<&String>> = Vec::new();

    if let Some(best) = &record.best_oa_location {
        raw.push(best.url_for_pdf.as_ref());
        raw.push(best.url.as_ref());
    }
    for location in &record.oa_locations {
        raw.push(location.url_for_pdf.as_ref());
        raw.push(location.url.as_ref());
    }

    let mut out: Vec<String> = Vec::new();
    for url in raw.into_iter().flatten() {
        let trimmed = url.trim();
        if trimmed.is_empty() || out.iter().any(|seen| seen == trimmed) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}
