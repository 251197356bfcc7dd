//! Paperfetch Core Library
//!
//! This library resolves research paper DOIs to PDF files and plans batch
//! downloads from topic searches. The primary path looks papers up in the
//! Unpaywall open-access index and downloads candidate URLs directly; an
//! external retrieval tool serves as an optional fallback.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`unpaywall`] - Open-access metadata lookup and candidate URL ordering
//! - [`acquire`] - Candidate URL download with PDF sniffing and one-hop HTML
//!   link discovery
//! - [`fallback`] - External retrieval tool adapter
//! - [`engine`] - Per-DOI resolution with escalation policy
//! - [`search`] - Scopus search client and query builders
//! - [`planner`] - Quantity/freshness planning and the batch drive loop
//! - [`naming`] - Filesystem-safe filenames and collision handling
//! - [`report`] - Run summaries for JSON and text output

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod acquire;
pub mod engine;
pub mod fallback;
pub mod naming;
pub mod planner;
pub mod report;
pub mod search;
pub mod unpaywall;

// Re-export commonly used types
pub use engine::{DownloadMethod, OutcomeStatus, ResolutionEngine, ResolutionOutcome};
pub use fallback::{FallbackConfig, FallbackError, FallbackMode};
pub use planner::{QuantityMode, QuantityPlan, QueryPlan};
pub use report::{FetchSummary, TopicSummary};
pub use search::{CandidateEntry, ScopusClient, SearchError, SearchPage, SearchProvider};
pub use unpaywall::{LookupError, OaRecord, UnpaywallClient};

/// Shared User-Agent for all outbound HTTP traffic (identifies the tool).
pub(crate) fn user_agent() -> String {
    format!(
        "{}/{} (academic-research-tool)",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_crate_version() {
        let ua = user_agent();
        assert!(ua.starts_with("paperfetch/"));
        assert!(ua.contains(env!("CARGO_PKG_VERSION")));
    }
}
