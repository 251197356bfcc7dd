//! Run summaries for JSON and text output.
//!
//! One summary per run: [`FetchSummary`] for explicit-DOI runs and
//! [`TopicSummary`] for planner-driven topic runs. The structs serialize to
//! the machine-readable report; the render functions produce the
//! line-per-field text layout.
//!
//! # Module structure note
//!
//! Single-file module (`mod.rs`-only): the feature scope is small enough to
//! not warrant sub-files.

use std::fmt::Write as _;

use serde::Serialize;

use crate::engine::ResolutionOutcome;
use crate::fallback::{FallbackConfig, FallbackMode};
use crate::planner::{CollectedCandidates, QuantityPlan, QueryPlan};

/// Summary of an explicit-DOI run.
#[derive(Debug, Serialize)]
pub struct FetchSummary {
    /// Contact email used for the open-access path.
    pub email: Option<String>,
    /// Number of deduplicated DOIs processed.
    pub doi_count: usize,
    /// Fallback escalation mode.
    pub fallback_mode: FallbackMode,
    /// Resolved fallback command, joined for display.
    pub fallback_command: Option<String>,
    /// Why no fallback command was resolved, when applicable.
    pub fallback_setup_error: Option<String>,
    /// One outcome per DOI, in input order.
    pub results: Vec<ResolutionOutcome>,
}

/// Summary of a planner-driven topic run.
#[derive(Debug, Serialize)]
pub struct TopicSummary {
    /// Full query sent to the search service.
    pub query: String,
    /// Sort expression used.
    pub sort: String,
    /// Whether recency semantics were in effect.
    pub latest_mode: bool,
    /// Inclusive lower year bound, when any.
    pub from_year: Option<i32>,
    /// Quantity preset the plan started from.
    pub quantity_mode: String,
    /// Target download count; `None` is unbounded.
    pub target_downloads: Option<usize>,
    /// Search-depth cap.
    pub search_cap: usize,
    /// Attempt cap.
    pub attempt_cap: usize,
    /// Total hits the search service reported.
    pub total_hits: usize,
    /// Entries scanned across pages.
    pub scanned_entries: usize,
    /// Deduplicated candidates with a DOI.
    pub candidate_count: usize,
    /// Scanned entries lacking a DOI.
    pub missing_doi_count: usize,
    /// Candidates attempted before any early stop.
    pub attempted_count: usize,
    /// Successful downloads.
    pub downloaded_count: usize,
    /// Fallback escalation mode.
    pub fallback_mode: FallbackMode,
    /// Resolved fallback command, joined for display.
    pub fallback_command: Option<String>,
    /// Why no fallback command was resolved, when applicable.
    pub fallback_setup_error: Option<String>,
    /// One outcome per attempted candidate, in rank order.
    pub results: Vec<ResolutionOutcome>,
}

impl FetchSummary {
    /// Assembles the summary for an explicit-DOI run.
    #[must_use]
    pub fn new(
        email: Option<String>,
        fallback: &FallbackConfig,
        results: Vec<ResolutionOutcome>,
    ) -> Self {
        Self {
            email,
            doi_count: results.len(),
            fallback_mode: fallback.mode,
            fallback_command: fallback.command.as_ref().map(|cmd| cmd.join(" ")),
            fallback_setup_error: fallback.setup_error.clone(),
            results,
        }
    }

    /// Number of successful downloads.
    #[must_use]
    pub fn downloaded_count(&self) -> usize {
        self.results.iter().filter(|r| r.downloaded()).count()
    }
}

impl TopicSummary {
    /// Assembles the summary for a topic run.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        query_plan: &QueryPlan,
        plan: &QuantityPlan,
        collected: &CollectedCandidates,
        fallback: &FallbackConfig,
        attempted: usize,
        downloaded: usize,
        results: Vec<ResolutionOutcome>,
    ) -> Self {
        Self {
            query: query_plan.query.clone(),
            sort: query_plan.sort.clone(),
            latest_mode: query_plan.latest_mode,
            from_year: query_plan.from_year,
            quantity_mode: plan.mode.to_string(),
            target_downloads: plan.target_downloads,
            search_cap: plan.search_cap,
            attempt_cap: plan.attempt_cap,
            total_hits: collected.total_hits,
            scanned_entries: collected.scanned,
            candidate_count: collected.candidates.len(),
            missing_doi_count: collected.missing_doi,
            attempted_count: attempted,
            downloaded_count: downloaded,
            fallback_mode: fallback.mode,
            fallback_command: fallback.command.as_ref().map(|cmd| cmd.join(" ")),
            fallback_setup_error: fallback.setup_error.clone(),
            results,
        }
    }
}

fn opt(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.is_empty() => v,
        _ => "N/A",
    }
}

fn render_outcome(out: &mut String, idx: usize, item: &ResolutionOutcome, with_search_meta: bool) {
    let _ = writeln!(out, "{idx}. DOI: {}", item.doi);
    let _ = writeln!(out, "   Status: {}", item.status);
    let _ = writeln!(
        out,
        "   Method: {}",
        item.download_method
            .map_or_else(|| "N/A".to_string(), |m| m.to_string())
    );
    if !with_search_meta {
        let _ = writeln!(
            out,
            "   Primary status: {}",
            item.primary_status
                .map_or_else(|| "N/A".to_string(), |s| s.to_string())
        );
    }
    let _ = writeln!(out, "   Title: {}", opt(item.title.as_deref()));
    if with_search_meta {
        let _ = writeln!(out, "   Source: {}", opt(item.venue.as_deref()));
        let _ = writeln!(out, "   Year: {}", opt(item.year.as_deref()));
        let _ = writeln!(out, "   Cited by: {}", item.cited_by.unwrap_or(0));
    }
    let _ = writeln!(out, "   URL: {}", opt(item.resolved_url.as_deref()));
    let _ = writeln!(
        out,
        "   Path: {}",
        item.path
            .as_deref()
            .map_or_else(|| "N/A".to_string(), |p| p.display().to_string())
    );
    if let Some(error) = &item.error {
        let _ = writeln!(out, "   Error: {error}");
    }
    if let Some(error) = &item.fallback_error {
        let _ = writeln!(out, "   Fallback error: {error}");
    }
}

/// Renders the text report for an explicit-DOI run.
#[must_use]
pub fn render_fetch_text(summary: &FetchSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Unpaywall email: {}", opt(summary.email.as_deref()));
    let _ = writeln!(out, "DOI count: {}", summary.doi_count);
    let _ = writeln!(out, "Fallback: {}", summary.fallback_mode);
    if let Some(command) = &summary.fallback_command {
        let _ = writeln!(out, "Fallback command: {command}");
    }
    if let Some(error) = &summary.fallback_setup_error {
        let _ = writeln!(out, "Fallback setup error: {error}");
    }
    let _ = writeln!(out);
    for (idx, item) in summary.results.iter().enumerate() {
        render_outcome(&mut out, idx + 1, item, false);
    }
    out
}

/// Renders the text report for a topic run.
#[must_use]
pub fn render_topic_text(summary: &TopicSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Query: {}", summary.query);
    let _ = writeln!(out, "Sort: {}", summary.sort);
    let _ = writeln!(out, "Latest mode: {}", summary.latest_mode);
    let _ = writeln!(
        out,
        "From year: {}",
        summary
            .from_year
            .map_or_else(|| "N/A".to_string(), |y| y.to_string())
    );
    let _ = writeln!(out, "Quantity mode: {}", summary.quantity_mode);
    let _ = writeln!(
        out,
        "Target downloads: {}",
        summary
            .target_downloads
            .map_or_else(|| "unbounded".to_string(), |t| t.to_string())
    );
    let _ = writeln!(
        out,
        "Search cap: {} | Attempt cap: {}",
        summary.search_cap, summary.attempt_cap
    );
    let _ = writeln!(out, "Total hits: {}", summary.total_hits);
    let _ = writeln!(out, "Scanned entries: {}", summary.scanned_entries);
    let _ = writeln!(
        out,
        "Candidates with DOI: {} | Missing DOI in scanned: {}",
        summary.candidate_count, summary.missing_doi_count
    );
    let _ = writeln!(
        out,
        "Downloaded: {} / Attempted: {}",
        summary.downloaded_count, summary.attempted_count
    );
    let _ = writeln!(out);
    for (idx, item) in summary.results.iter().enumerate() {
        render_outcome(&mut out, idx + 1, item, true);
    }
    out
}
