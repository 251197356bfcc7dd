//! Per-DOI resolution outcome record.

use std::path::PathBuf;

use serde::Serialize;

/// Terminal status of a resolution (or of its primary path).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// A PDF was written to disk.
    Downloaded,
    /// The paper has no open-access location.
    NoOa,
    /// Open access, but no candidate URL was offered.
    NoDownloadUrl,
    /// Every attempted path failed.
    Failed,
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Downloaded => write!(f, "downloaded"),
            Self::NoOa => write!(f, "no_oa"),
            Self::NoDownloadUrl => write!(f, "no_download_url"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Which acquisition path produced the downloaded file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMethod {
    /// Open-access metadata lookup plus direct acquisition.
    Unpaywall,
    /// External retrieval tool.
    ScihubFallback,
}

impl std::fmt::Display for DownloadMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unpaywall => write!(f, "unpaywall"),
            Self::ScihubFallback => write!(f, "scihub_fallback"),
        }
    }
}

/// One record per DOI resolution.
///
/// Mutated incrementally by the engine during a single resolution call, then
/// returned immutable. The planner attaches venue/year/citation metadata to
/// outcomes it drives.
#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    /// The DOI this outcome describes, case preserved.
    pub doi: String,
    /// Terminal status.
    pub status: OutcomeStatus,
    /// Title discovered during resolution (or attached from search metadata).
    pub title: Option<String>,
    /// Open-access flag from the metadata lookup; `None` when no lookup ran.
    pub is_oa: Option<bool>,
    /// Last URL the resolution reached (final PDF URL on success).
    pub resolved_url: Option<String>,
    /// Path of the written PDF, on success.
    pub path: Option<PathBuf>,
    /// Top-level error string; prefers the primary path's error when both
    /// primary and fallback failed.
    pub error: Option<String>,
    /// Which path produced the file, on success.
    pub download_method: Option<DownloadMethod>,
    /// Status the primary (open-access) path ended with.
    pub primary_status: Option<OutcomeStatus>,
    /// Representative primary-path error (last candidate's, when several failed).
    pub primary_error: Option<String>,
    /// Whether the external fallback tool was actually invoked.
    pub fallback_attempted: bool,
    /// Fallback failure or setup error, when any.
    pub fallback_error: Option<String>,
    /// Source venue, attached by the batch planner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    /// Publication year, attached by the batch planner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<String>,
    /// Citation count, attached by the batch planner.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cited_by: Option<u64>,
}

impl ResolutionOutcome {
    /// Creates a pending outcome for `doi` with `failed` as the default
    /// status until a path succeeds or classifies the failure.
    #[must_use]
    pub fn new(doi: impl Into<String>) -> Self {
        Self {
            doi: doi.into(),
            status: OutcomeStatus::Failed,
            title: None,
            is_oa: None,
            resolved_url: None,
            path: None,
            error: None,
            download_method: None,
            primary_status: None,
            primary_error: None,
            fallback_attempted: false,
            fallback_error: None,
            venue: None,
            year: None,
            cited_by: None,
        }
    }

    /// Whether this resolution produced a file.
    #[must_use]
    pub fn downloaded(&self) -> bool {
        self.status == OutcomeStatus::Downloaded
    }
}
