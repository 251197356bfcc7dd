//! Batch planning and the candidate drive loop.
//!
//! Turns a quantity/freshness intent into numeric caps ([`plan`]), pages
//! through the search collaborator into a deduplicated, bounded candidate
//! list, and drives the resolution engine over that list with early-stop
//! rules.

mod plan;

pub use plan::{
    FreshnessIntent, PlanOverrides, QuantityMode, QuantityPlan, QueryInput, QueryPlan,
    build_query_plan, decide_plan,
};

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::engine::{ResolutionEngine, ResolutionOutcome};
use crate::search::{CandidateEntry, SearchError, SearchProvider};

/// Candidate entries assembled from paged search results.
#[derive(Debug, Clone, Serialize)]
pub struct CollectedCandidates {
    /// Total hits the search service reported for the query.
    pub total_hits: usize,
    /// Entries scanned across all pages (including dropped ones).
    pub scanned: usize,
    /// Scanned entries discarded for lacking a DOI.
    pub missing_doi: usize,
    /// Deduplicated candidates, in search-rank order.
    pub candidates: Vec<CandidateEntry>,
}

/// Pages through the search collaborator and assembles bounded candidates.
///
/// Scanning stops when the search-depth cap is reached, the attempt cap
/// (deduplicated-candidate count) is reached, a page comes back empty, or the
/// cumulative scanned count reaches the reported total. Entries without a DOI
/// are counted and discarded; duplicate DOIs (exact string) are discarded
/// silently. The two-tier cap bounds API cost and downstream work
/// independently.
///
/// # Errors
///
/// Returns the first [`SearchError`] from the collaborator; partially
/// collected pages are not surfaced.
pub async fn collect_candidate_entries(
    provider: &dyn SearchProvider,
    query: &str,
    page_size: usize,
    sort: &str,
    plan: &QuantityPlan,
) -> Result<CollectedCandidates, SearchError> {
    let mut start = 0usize;
    let mut total_hits: Option<usize> = None;
    let mut candidates: Vec<CandidateEntry> = Vec::new();
    let mut seen_dois: HashSet<String> = HashSet::new();
    let mut missing_doi = 0usize;

    while start < plan.search_cap && candidates.len() < plan.attempt_cap {
        let count = std::cmp::min(page_size.max(1), plan.search_cap - start);
        let page = provider.search(query, count, start, sort).await?;

        if total_hits.is_none() {
            total_hits = Some(page.total);
        }
        if page.entries.is_empty() {
            break;
        }

        let page_len = page.entries.len();
        for entry in page.entries {
            let Some(doi) = entry.doi.clone() else {
                missing_doi += 1;
                continue;
            };
            if !seen_dois.insert(doi) {
                continue;
            }
            candidates.push(entry);
            if candidates.len() >= plan.attempt_cap {
                break;
            }
        }

        start += page_len;
        if let Some(total) = total_hits
            && start >= total
        {
            break;
        }
    }

    debug!(
        scanned = start,
        candidates = candidates.len(),
        missing_doi,
        "Candidate collection finished"
    );

    Ok(CollectedCandidates {
        total_hits: total_hits.unwrap_or(0),
        scanned: start,
        missing_doi,
        candidates,
    })
}

/// Result of driving the engine across a candidate list.
#[derive(Debug)]
pub struct BatchRun {
    /// Outcomes in candidate order (post-deduplication search rank).
    pub outcomes: Vec<ResolutionOutcome>,
    /// Candidates actually attempted before any early stop.
    pub attempted: usize,
    /// Successful downloads.
    pub downloaded: usize,
}

/// Drives the resolution engine once per candidate, in list order.
///
/// Venue/year/citation metadata is attached to each outcome, and the search
/// title fills in when resolution discovered none. The loop stops the moment
/// the downloaded count reaches the success cap or the target count - a cost
/// short-circuit, not a correctness requirement.
pub async fn run_batch(
    engine: &ResolutionEngine,
    candidates: Vec<CandidateEntry>,
    plan: &QuantityPlan,
) -> BatchRun {
    let mut outcomes: Vec<ResolutionOutcome> = Vec::new();
    let mut downloaded = 0usize;
    let mut attempted = 0usize;

    for entry in candidates {
        let Some(doi) = entry.doi.clone() else {
            continue;
        };

        let mut outcome = engine.resolve(&doi).await;
        outcome.venue = Some(entry.venue);
        outcome.year = entry.year;
        outcome.cited_by = Some(entry.cited_by);
        if outcome.title.as_deref().is_none_or(str::is_empty) {
            outcome.title = Some(entry.title);
        }

        attempted += 1;
        if outcome.downloaded() {
            downloaded += 1;
        }
        outcomes.push(outcome);

        let success_hit = plan.success_cap.is_some_and(|cap| downloaded >= cap);
        let target_hit = plan.target_downloads.is_some_and(|t| downloaded >= t);
        if success_hit || target_hit {
            info!(downloaded, attempted, "Stopping early: download goal reached");
            break;
        }
    }

    BatchRun {
        outcomes,
        attempted,
        downloaded,
    }
}
