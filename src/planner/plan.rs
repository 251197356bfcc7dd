//! Quantity and query planning.
//!
//! Translates fuzzy quantity intent ("a few", "a full batch", "as many as
//! possible") and freshness intent ("latest N years") into concrete numeric
//! caps and a search-service query.

use chrono::{Datelike, Utc};
use serde::Serialize;

use crate::search::{keywords_query, title_query};

/// Named quantity presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuantityMode {
    /// Around five papers.
    Few,
    /// Around twenty papers.
    Batch,
    /// As many as possible under the caps.
    Max,
}

impl std::fmt::Display for QuantityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Few => write!(f, "few"),
            Self::Batch => write!(f, "batch"),
            Self::Max => write!(f, "max"),
        }
    }
}

/// Concrete numeric caps derived once per run.
#[derive(Debug, Clone, Serialize)]
pub struct QuantityPlan {
    /// The preset this plan started from.
    pub mode: QuantityMode,
    /// Target download count; `None` is unbounded (`max` mode).
    pub target_downloads: Option<usize>,
    /// Maximum search entries to scan across pages.
    pub search_cap: usize,
    /// Maximum deduplicated candidates to attempt.
    pub attempt_cap: usize,
    /// Hard cap on successful downloads.
    pub success_cap: Option<usize>,
}

/// Explicit CLI overrides applied on top of a preset.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanOverrides {
    /// Explicit target download count; rescales the scan/attempt caps.
    pub target: Option<usize>,
    /// Explicit search-depth cap.
    pub max_search_results: Option<usize>,
    /// Explicit attempt cap.
    pub max_attempts: Option<usize>,
    /// Explicit success cap.
    pub max_success: Option<usize>,
}

/// Derives the numeric plan for a quantity mode plus explicit overrides.
///
/// An explicit target rescales the search cap to `clamp(target*4, 30, 600)`
/// and the attempt cap to `clamp(target*3, 20, 500)`; individual cap
/// overrides win over both. All caps floor at 1.
#[must_use]
pub fn decide_plan(mode: QuantityMode, overrides: &PlanOverrides) -> QuantityPlan {
    let (mut target_downloads, mut search_cap, mut attempt_cap, mut success_cap) = match mode {
        QuantityMode::Few => (Some(5), 30, 20, Some(5)),
        QuantityMode::Batch => (Some(20), 120, 80, Some(20)),
        QuantityMode::Max => (None, 300, 300, Some(100)),
    };

    if let Some(target) = overrides.target.filter(|t| *t > 0) {
        target_downloads = Some(target);
        search_cap = (target * 4).clamp(30, 600);
        attempt_cap = (target * 3).clamp(20, 500);
        success_cap = Some(target);
    }

    if let Some(cap) = overrides.max_search_results.filter(|c| *c > 0) {
        search_cap = cap;
    }
    if let Some(cap) = overrides.max_attempts.filter(|c| *c > 0) {
        attempt_cap = cap;
    }
    if let Some(cap) = overrides.max_success.filter(|c| *c > 0) {
        success_cap = Some(cap);
    }

    QuantityPlan {
        mode,
        target_downloads,
        search_cap: search_cap.max(1),
        attempt_cap: attempt_cap.max(1),
        success_cap,
    }
}

/// How the base search query is expressed.
#[derive(Debug, Clone)]
pub enum QueryInput {
    /// Raw query string passed through untouched.
    Raw(String),
    /// Exact-title lookup.
    Title(String),
    /// Topic keywords.
    Keywords(String),
}

/// Freshness intent from the CLI.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreshnessIntent {
    /// Prefer latest papers: adds a year bound and recency sort.
    pub latest: bool,
    /// Lookback window for `latest`, in years.
    pub years_back: i32,
    /// Explicit inclusive lower year bound; wins over `latest`.
    pub from_year: Option<i32>,
}

/// The composed search query with its sort and year bound.
#[derive(Debug, Clone, Serialize)]
pub struct QueryPlan {
    /// Full query string sent to the search service.
    pub query: String,
    /// Sort expression.
    pub sort: String,
    /// Whether recency semantics are in effect.
    pub latest_mode: bool,
    /// Inclusive lower year bound, when any.
    pub from_year: Option<i32>,
}

/// Composes the query plan from the base query and freshness intent.
///
/// Default sort is recency (`-coverDate`) when a year bound or latest flag is
/// present, otherwise citation count (`-citedby-count`).
#[must_use]
pub fn build_query_plan(
    input: &QueryInput,
    freshness: &FreshnessIntent,
    sort_override: Option<&str>,
) -> QueryPlan {
    build_query_plan_with_year(input, freshness, sort_override, Utc::now().year())
}

fn build_query_plan_with_year(
    input: &QueryInput,
    freshness: &FreshnessIntent,
    sort_override: Option<&str>,
    current_year: i32,
) -> QueryPlan {
    let base_query = match input {
        QueryInput::Raw(query) => query.clone(),
        QueryInput::Title(title) => title_query(title),
        QueryInput::Keywords(keywords) => keywords_query(keywords),
    };

    let from_year = resolve_from_year(freshness, current_year);
    let latest_mode = freshness.latest || from_year.is_some();

    let query = match from_year {
        // PUBYEAR comparisons are exclusive; "> from_year - 1" is inclusive
        // for from_year.
        Some(year) => format!("({base_query}) AND PUBYEAR > {}", year - 1),
        None => base_query,
    };

    let sort = sort_override.map_or_else(
        || {
            if latest_mode {
                "-coverDate".to_string()
            } else {
                "-citedby-count".to_string()
            }
        },
        str::to_string,
    );

    QueryPlan {
        query,
        sort,
        latest_mode,
        from_year,
    }
}

fn resolve_from_year(freshness: &FreshnessIntent, current_year: i32) -> Option<i32> {
    if let Some(year) = freshness.from_year.filter(|y| *y > 0) {
        return Some(year);
    }
    if freshness.latest {
        let years_back = freshness.years_back.max(1);
        return Some(current_year - years_back + 1);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decide_plan_few_preset() {
        let plan = decide_plan(QuantityMode::Few, &PlanOverrides::default());
        assert_eq!(plan.target_downloads, Some(5));
        assert_eq!(plan.search_cap, 30);
        assert_eq!(plan.attempt_cap, 20);
        assert_eq!(plan.success_cap, Some(5));
    }

    #[test]
    fn test_decide_plan_batch_preset() {
        let plan = decide_plan(QuantityMode::Batch, &PlanOverrides::default());
        assert_eq!(plan.target_downloads, Some(20));
        assert_eq!(plan.search_cap, 120);
        assert_eq!(plan.attempt_cap, 80);
        assert_eq!(plan.success_cap, Some(20));
    }

    #[test]
    fn test_decide_plan_max_preset_is_unbounded() {
        let plan = decide_plan(QuantityMode::Max, &PlanOverrides::default());
        assert_eq!(plan.target_downloads, None);
        assert_eq!(plan.search_cap, 300);
        assert_eq!(plan.attempt_cap, 300);
        assert_eq!(plan.success_cap, Some(100));
    }

    #[test]
    fn test_decide_plan_explicit_target_rescales_caps() {
        let overrides = PlanOverrides {
            target: Some(50),
            ..Default::default()
        };
        let plan = decide_plan(QuantityMode::Batch, &overrides);
        assert_eq!(plan.target_downloads, Some(50));
        assert_eq!(plan.search_cap, 200);
        assert_eq!(plan.attempt_cap, 150);
        assert_eq!(plan.success_cap, Some(50));
    }

    #[test]
    fn test_decide_plan_rescale_respects_clamps() {
        let small = decide_plan(
            QuantityMode::Batch,
            &PlanOverrides {
                target: Some(2),
                ..Default::default()
            },
        );
        assert_eq!(small.search_cap, 30);
        assert_eq!(small.attempt_cap, 20);

        let large = decide_plan(
            QuantityMode::Batch,
            &PlanOverrides {
                target: Some(400),
                ..Default::default()
            },
        );
        assert_eq!(large.search_cap, 600);
        assert_eq!(large.attempt_cap, 500);
    }

    #[test]
    fn test_decide_plan_cap_overrides_win_over_rescale() {
        let overrides = PlanOverrides {
            target: Some(50),
            max_search_results: Some(77),
            max_attempts: Some(33),
            max_success: Some(9),
        };
        let plan = decide_plan(QuantityMode::Few, &overrides);
        assert_eq!(plan.search_cap, 77);
        assert_eq!(plan.attempt_cap, 33);
        assert_eq!(plan.success_cap, Some(9));
        assert_eq!(plan.target_downloads, Some(50));
    }

    #[test]
    fn test_decide_plan_zero_overrides_ignored() {
        let overrides = PlanOverrides {
            target: Some(0),
            max_search_results: Some(0),
            ..Default::default()
        };
        let plan = decide_plan(QuantityMode::Few, &overrides);
        assert_eq!(plan.target_downloads, Some(5));
        assert_eq!(plan.search_cap, 30);
    }

    #[test]
    fn test_query_plan_keywords_default_sort() {
        let plan = build_query_plan_with_year(
            &QueryInput::Keywords("deep learning".to_string()),
            &FreshnessIntent::default(),
            None,
            2026,
        );
        assert_eq!(plan.query, r#"TITLE-ABS-KEY("deep learning")"#);
        assert_eq!(plan.sort, "-citedby-count");
        assert!(!plan.latest_mode);
        assert!(plan.from_year.is_none());
    }

    #[test]
    fn test_query_plan_latest_adds_year_bound_and_recency_sort() {
        let freshness = FreshnessIntent {
            latest: true,
            years_back: 3,
            from_year: None,
        };
        let plan = build_query_plan_with_year(
            &QueryInput::Keywords("perovskite".to_string()),
            &freshness,
            None,
            2026,
        );
        assert_eq!(plan.from_year, Some(2024));
        assert_eq!(
            plan.query,
            r#"(TITLE-ABS-KEY("perovskite")) AND PUBYEAR > 2023"#
        );
        assert_eq!(plan.sort, "-coverDate");
        assert!(plan.latest_mode);
    }

    #[test]
    fn test_query_plan_explicit_from_year_wins() {
        let freshness = FreshnessIntent {
            latest: true,
            years_back: 3,
            from_year: Some(2020),
        };
        let plan = build_query_plan_with_year(
            &QueryInput::Raw("SRCTYPE(j)".to_string()),
            &freshness,
            None,
            2026,
        );
        assert_eq!(plan.from_year, Some(2020));
        assert_eq!(plan.query, "(SRCTYPE(j)) AND PUBYEAR > 2019");
    }

    #[test]
    fn test_query_plan_years_back_floors_at_one() {
        let freshness = FreshnessIntent {
            latest: true,
            years_back: 0,
            from_year: None,
        };
        let plan = build_query_plan_with_year(
            &QueryInput::Keywords("x".to_string()),
            &freshness,
            None,
            2026,
        );
        assert_eq!(plan.from_year, Some(2026));
    }

    #[test]
    fn test_query_plan_sort_override() {
        let plan = build_query_plan_with_year(
            &QueryInput::Title("Some Title".to_string()),
            &FreshnessIntent::default(),
            Some("+coverDate"),
            2026,
        );
        assert_eq!(plan.sort, "+coverDate");
        assert_eq!(plan.query, r#"TITLE("Some Title")"#);
    }
}
