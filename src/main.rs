//! CLI entry point for the paperfetch tool.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tracing::{debug, info};

use paperfetch::acquire::PdfAcquirer;
use paperfetch::engine::ResolutionEngine;
use paperfetch::fallback::{FallbackConfig, FallbackMode};
use paperfetch::planner::{
    self, FreshnessIntent, PlanOverrides, QueryInput, build_query_plan, decide_plan,
};
use paperfetch::report::{self, FetchSummary, TopicSummary};
use paperfetch::search::ScopusClient;
use paperfetch::unpaywall::UnpaywallClient;

mod cli;

use cli::{Cli, Command, CommonArgs, FetchArgs, TopicArgs};

/// The run completed but produced zero downloads.
const EXIT_NO_DOWNLOADS: u8 = 1;
/// Missing credentials or unusable arguments.
const EXIT_USAGE: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // Parse CLI arguments first (before tracing, so --help works without logs)
    let cli = Cli::parse();

    // Determine log level based on verbose/quiet flags
    // Priority: RUST_LOG env var > quiet flag > verbose flag > default (info)
    let default_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = match cli.command {
        Command::Fetch(args) => run_fetch(args).await,
        Command::Topic(args) => run_topic(args).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(EXIT_NO_DOWNLOADS)
        }
    }
}

async fn run_fetch(args: FetchArgs) -> Result<ExitCode> {
    let dois = load_dois(&args)?;
    if dois.is_empty() {
        eprintln!("error: no DOIs given; use --doi or --doi-file");
        return Ok(ExitCode::from(EXIT_USAGE));
    }
    if args.common.email.is_none() && args.common.fallback != FallbackMode::Force {
        eprintln!("error: --email (or UNPAYWALL_EMAIL) is required unless --fallback force");
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    let engine = build_engine(&args.common)?;
    info!(dois = dois.len(), outdir = %args.common.outdir.display(), "Starting DOI fetch");

    let mut results = Vec::with_capacity(dois.len());
    for doi in &dois {
        results.push(engine.resolve(doi).await);
    }

    let summary = FetchSummary::new(args.common.email.clone(), engine.fallback_config(), results);
    let downloaded = summary.downloaded_count();
    let text = report::render_fetch_text(&summary);
    emit_report(args.common.json, args.common.out.as_deref(), &summary, text)?;

    info!(downloaded, total = dois.len(), "Fetch complete");
    Ok(exit_for(downloaded))
}

async fn run_topic(args: TopicArgs) -> Result<ExitCode> {
    let Some(api_key) = args.api_key.clone() else {
        eprintln!("error: --api-key (or ELSEVIER_API_KEY) is required");
        return Ok(ExitCode::from(EXIT_USAGE));
    };
    if args.common.email.is_none() && args.common.fallback != FallbackMode::Force {
        eprintln!("error: --email (or UNPAYWALL_EMAIL) is required unless --fallback force");
        return Ok(ExitCode::from(EXIT_USAGE));
    }

    // clap guarantees exactly one of the three inputs is present.
    let input = if let Some(query) = &args.query {
        QueryInput::Raw(query.clone())
    } else if let Some(title) = &args.title {
        QueryInput::Title(title.clone())
    } else if let Some(keywords) = &args.keywords {
        QueryInput::Keywords(keywords.clone())
    } else {
        eprintln!("error: one of --keywords, --title, or --query is required");
        return Ok(ExitCode::from(EXIT_USAGE));
    };

    let freshness = FreshnessIntent {
        latest: args.latest,
        years_back: args.years_back,
        from_year: args.from_year,
    };
    let query_plan = build_query_plan(&input, &freshness, args.sort.as_deref());
    let plan = decide_plan(
        args.quantity_mode,
        &PlanOverrides {
            target: args.target,
            max_search_results: args.max_search_results,
            max_attempts: args.max_attempts,
            max_success: args.max_success,
        },
    );
    info!(
        query = %query_plan.query,
        sort = %query_plan.sort,
        search_cap = plan.search_cap,
        attempt_cap = plan.attempt_cap,
        "Topic plan ready"
    );

    let provider = ScopusClient::new(api_key, Duration::from_secs(args.common.timeout))?;
    let page_size = usize::try_from(args.page_size).unwrap_or(25);
    let collected = planner::collect_candidate_entries(
        &provider,
        &query_plan.query,
        page_size,
        &query_plan.sort,
        &plan,
    )
    .await?;
    info!(
        total_hits = collected.total_hits,
        scanned = collected.scanned,
        candidates = collected.candidates.len(),
        missing_doi = collected.missing_doi,
        "Search complete"
    );

    let engine = build_engine(&args.common)?;
    let run = planner::run_batch(&engine, collected.candidates.clone(), &plan).await;

    let summary = TopicSummary::new(
        &query_plan,
        &plan,
        &collected,
        engine.fallback_config(),
        run.attempted,
        run.downloaded,
        run.outcomes,
    );
    let text = report::render_topic_text(&summary);
    emit_report(args.common.json, args.common.out.as_deref(), &summary, text)?;

    info!(
        downloaded = run.downloaded,
        attempted = run.attempted,
        "Topic run complete"
    );
    Ok(exit_for(run.downloaded))
}

/// Assembles the per-run collaborators shared by both subcommands.
fn build_engine(common: &CommonArgs) -> Result<ResolutionEngine> {
    let timeout = Duration::from_secs(common.timeout);

    // FallbackConfig::resolve logs the setup error when the tool is missing.
    let fallback = FallbackConfig::resolve(
        common.fallback,
        common.fallback_cmd.as_deref(),
        common.fallback_email.clone().or_else(|| common.email.clone()),
        common.fallback_timeout,
    );

    let unpaywall = match &common.email {
        Some(email) => Some(UnpaywallClient::new(email.clone(), timeout)?),
        None => None,
    };
    let acquirer = PdfAcquirer::new(timeout)?;

    fs::create_dir_all(&common.outdir)
        .with_context(|| format!("creating output directory {}", common.outdir.display()))?;

    Ok(ResolutionEngine::new(
        unpaywall,
        acquirer,
        fallback,
        common.outdir.clone(),
    ))
}

/// Collects DOIs from the repeated flag plus the optional file, preserving
/// first-seen order and dropping exact duplicates.
fn load_dois(args: &FetchArgs) -> Result<Vec<String>> {
    let mut dois = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for doi in &args.dois {
        push_doi(doi, &mut seen, &mut dois);
    }
    if let Some(path) = &args.doi_file {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading DOI file {}", path.display()))?;
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            push_doi(line, &mut seen, &mut dois);
        }
    }

    debug!(count = dois.len(), "DOIs loaded");
    Ok(dois)
}

fn push_doi(raw: &str, seen: &mut HashSet<String>, out: &mut Vec<String>) {
    let doi = raw.trim();
    if !doi.is_empty() && seen.insert(doi.to_string()) {
        out.push(doi.to_string());
    }
}

fn emit_report<S: Serialize>(json: bool, out: Option<&Path>, summary: &S, text: String) -> Result<()> {
    let rendered = if json {
        let mut body = serde_json::to_string_pretty(summary).context("serializing run summary")?;
        body.push('\n');
        body
    } else {
        text
    };
    match out {
        Some(path) => fs::write(path, rendered)
            .with_context(|| format!("writing run summary to {}", path.display()))?,
        None => print!("{rendered}"),
    }
    Ok(())
}

fn exit_for(downloaded: usize) -> ExitCode {
    if downloaded > 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_NO_DOWNLOADS)
    }
}
