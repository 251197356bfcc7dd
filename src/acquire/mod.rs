//! PDF acquisition from candidate URLs.
//!
//! Given a URL, fetch the bytes, decide whether they are a PDF, and if the
//! response is an HTML landing page instead, follow at most one discovered
//! PDF link before giving up. The two-hop policy bounds worst-case work per
//! candidate URL to two HTTP round trips.
//!
//! Classification rule: a body is a PDF when it starts with the `%PDF` magic
//! header or the declared content type contains "pdf". The magic header takes
//! precedence, which guards against mislabelled content types.

mod html;

pub use html::extract_pdf_link;

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::user_agent;

/// First bytes of every PDF file.
pub const PDF_MAGIC: &[u8; 4] = b"%PDF";

/// Errors that can occur while acquiring a PDF from a candidate URL.
///
/// The `Display` forms are the stable error codes recorded in resolution
/// outcomes.
#[derive(Debug, Error)]
pub enum AcquireError {
    /// Transport failure or error status on the first fetch.
    #[error("request_error: {source}")]
    Request {
        /// The underlying request error.
        #[source]
        source: reqwest::Error,
    },

    /// Response was neither a PDF nor an HTML page to mine for links.
    #[error("non_pdf_content_type: {content_type}")]
    NonPdfContentType {
        /// The declared content type.
        content_type: String,
    },

    /// HTML page contained no discoverable PDF link.
    #[error("html_without_pdf_link")]
    HtmlWithoutPdfLink,

    /// Transport failure or error status on the discovered-link fetch.
    #[error("followup_request_error: {source}")]
    FollowupRequest {
        /// The underlying request error.
        #[source]
        source: reqwest::Error,
    },

    /// The discovered link did not yield a PDF either.
    #[error("followup_non_pdf_content_type: {content_type}")]
    FollowupNonPdfContentType {
        /// The declared content type of the followup response.
        content_type: String,
    },

    /// Writing the fetched bytes to disk failed.
    #[error("write_error: {path}: {source}")]
    Io {
        /// Destination path that failed.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// HTTP client construction failed.
    #[error("client_error: {source}")]
    Client {
        /// The underlying builder error.
        #[source]
        source: reqwest::Error,
    },
}

/// Result of one candidate-URL download attempt.
#[derive(Debug)]
pub struct DownloadAttempt {
    /// The last URL reached: final post-redirect URL on success, the URL the
    /// failure was observed at otherwise.
    pub resolved_url: String,
    /// `None` on success; the transport/classification error otherwise.
    pub error: Option<AcquireError>,
}

impl DownloadAttempt {
    /// Whether the attempt wrote a PDF to the destination.
    #[must_use]
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }

    fn success(resolved_url: String) -> Self {
        Self {
            resolved_url,
            error: None,
        }
    }

    fn failure(resolved_url: String, error: AcquireError) -> Self {
        Self {
            resolved_url,
            error: Some(error),
        }
    }
}

/// Classifies fetched bytes as PDF content.
#[must_use]
pub fn is_pdf(data: &[u8], content_type: &str) -> bool {
    data.starts_with(PDF_MAGIC) || content_type.to_ascii_lowercase().contains("pdf")
}

struct Fetched {
    body: Vec<u8>,
    content_type: String,
    final_url: String,
}

/// HTTP acquirer that downloads candidate URLs and sniffs for PDF content.
///
/// Created once per run and reused across candidates for connection pooling.
#[derive(Debug, Clone)]
pub struct PdfAcquirer {
    client: Client,
}

impl PdfAcquirer {
    /// Creates an acquirer with the given per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`AcquireError::Client`] if HTTP client construction fails.
    pub fn new(timeout: Duration) -> Result<Self, AcquireError> {
        let client = Client::builder()
            .user_agent(user_agent())
            .timeout(timeout)
            .build()
            .map_err(|source| AcquireError::Client { source })?;
        Ok(Self { client })
    }

    /// Attempts to download a PDF from `url` into `dest`.
    ///
    /// Transport failures are not retried here; escalation to the next
    /// candidate URL or the fallback path is the caller's concern. At most
    /// one level of HTML-to-PDF-link indirection is followed.
    pub async fn attempt_download(&self, url: &str, dest: &Path) -> DownloadAttempt {
        let fetched = match self.fetch(url).await {
            Ok(fetched) => fetched,
            Err(source) => {
                return DownloadAttempt::failure(
                    url.to_string(),
                    AcquireError::Request { source },
                );
            }
        };

        if is_pdf(&fetched.body, &fetched.content_type) {
            return self.write_pdf(fetched.final_url, &fetched.body, dest).await;
        }

        if !fetched.content_type.contains("html") {
            debug!(content_type = %fetched.content_type, "Candidate is neither PDF nor HTML");
            return DownloadAttempt::failure(
                fetched.final_url,
                AcquireError::NonPdfContentType {
                    content_type: fetched.content_type,
                },
            );
        }

        let page = String::from_utf8_lossy(&fetched.body);
        let Some(link) = extract_pdf_link(&page) else {
            debug!(url = %fetched.final_url, "HTML page has no discoverable PDF link");
            return DownloadAttempt::failure(fetched.final_url, AcquireError::HtmlWithoutPdfLink);
        };

        // Discovered links are often relative; resolve against the page URL.
        let followup_url = resolve_link(&fetched.final_url, &link);
        debug!(followup_url = %followup_url, "Following discovered PDF link");

        let followup = match self.fetch(&followup_url).await {
            Ok(fetched) => fetched,
            Err(source) => {
                return DownloadAttempt::failure(
                    followup_url,
                    AcquireError::FollowupRequest { source },
                );
            }
        };

        if !is_pdf(&followup.body, &followup.content_type) {
            return DownloadAttempt::failure(
                followup.final_url,
                AcquireError::FollowupNonPdfContentType {
                    content_type: followup.content_type,
                },
            );
        }

        self.write_pdf(followup.final_url, &followup.body, dest)
            .await
    }

    async fn fetch(&self, url: &str) -> Result<Fetched, reqwest::Error> {
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/pdf, text/html;q=0.9, */*;q=0.8")
            .send()
            .await?
            .error_for_status()?;

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();
        let body = response.bytes().await?.to_vec();

        Ok(Fetched {
            body,
            content_type,
            final_url,
        })
    }

    async fn write_pdf(&self, resolved_url: String, body: &[u8], dest: &Path) -> DownloadAttempt {
        match tokio::fs::write(dest, body).await {
            Ok(()) => {
                debug!(path = %dest.display(), bytes = body.len(), "PDF written");
                DownloadAttempt::success(resolved_url)
            }
            Err(source) => DownloadAttempt::failure(
                resolved_url,
                AcquireError::Io {
                    path: dest.to_path_buf(),
                    source,
                },
            ),
        }
    }
}

/// Resolves a discovered link against the page URL it came from.
///
/// Falls back to the raw link when the base URL does not parse (the followup
/// fetch will then surface the real error).
fn resolve_link(base: &str, link: &str) -> String {
    match Url::parse(base).and_then(|base| base.join(link)) {
        Ok(joined) => joined.to_string(),
        Err(_) => link.to_string(),
    }
}
