//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

use paperfetch::fallback::FallbackMode;
use paperfetch::planner::QuantityMode;

/// Fetch research paper PDFs by DOI or by topic search.
///
/// Paperfetch resolves DOIs through the Unpaywall open-access index, downloads
/// candidate PDFs directly, and can escalate to an external retrieval tool
/// when the open-access path comes up empty.
#[derive(Parser, Debug)]
#[command(name = "paperfetch")]
#[command(author, version, about)]
pub struct Cli {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download PDFs for an explicit list of DOIs
    Fetch(FetchArgs),
    /// Search a topic, plan a batch, and download the results
    Topic(TopicArgs),
}

/// Flags shared by both subcommands.
#[derive(ClapArgs, Debug)]
pub struct CommonArgs {
    /// Contact email for the Unpaywall API
    #[arg(long, env = "UNPAYWALL_EMAIL")]
    pub email: Option<String>,

    /// Output directory for downloaded PDFs
    #[arg(short, long, default_value = "./downloads")]
    pub outdir: PathBuf,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 45, value_parser = clap::value_parser!(u64).range(1..=600))]
    pub timeout: u64,

    /// When to use the external retrieval tool
    #[arg(long, value_enum, default_value_t = FallbackMode::Auto)]
    pub fallback: FallbackMode,

    /// Override the fallback tool command line
    #[arg(long)]
    pub fallback_cmd: Option<String>,

    /// Contact email passed to the fallback tool
    #[arg(long)]
    pub fallback_email: Option<String>,

    /// Overall fallback timeout per DOI in seconds
    #[arg(long, default_value_t = 180, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub fallback_timeout: u64,

    /// Emit the run summary as JSON instead of text
    #[arg(long)]
    pub json: bool,

    /// Write the run summary to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

#[derive(ClapArgs, Debug)]
pub struct FetchArgs {
    /// DOI to fetch (repeatable)
    #[arg(long = "doi", value_name = "DOI")]
    pub dois: Vec<String>,

    /// File with one DOI per line; blank lines and # comments are skipped
    #[arg(long, value_name = "PATH")]
    pub doi_file: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(ClapArgs, Debug)]
#[command(group(clap::ArgGroup::new("query_input").required(true)))]
pub struct TopicArgs {
    /// Topic keywords searched in title, abstract, and author keywords
    #[arg(long, group = "query_input")]
    pub keywords: Option<String>,

    /// Exact title phrase to search for
    #[arg(long, group = "query_input")]
    pub title: Option<String>,

    /// Raw Scopus query passed through untouched
    #[arg(long, group = "query_input")]
    pub query: Option<String>,

    /// Scopus API key
    #[arg(long, env = "ELSEVIER_API_KEY")]
    pub api_key: Option<String>,

    /// How many papers to aim for
    #[arg(long, value_enum, default_value_t = QuantityMode::Batch)]
    pub quantity_mode: QuantityMode,

    /// Explicit target download count; rescales the scan and attempt caps
    #[arg(long)]
    pub target: Option<usize>,

    /// Maximum search entries to scan
    #[arg(long)]
    pub max_search_results: Option<usize>,

    /// Maximum candidates to attempt
    #[arg(long)]
    pub max_attempts: Option<usize>,

    /// Hard cap on successful downloads
    #[arg(long)]
    pub max_success: Option<usize>,

    /// Prefer the latest papers: bounds the publication year and sorts by recency
    #[arg(long)]
    pub latest: bool,

    /// Lookback window for --latest, in years
    #[arg(long, default_value_t = 3)]
    pub years_back: i32,

    /// Inclusive lower publication-year bound; wins over --latest
    #[arg(long)]
    pub from_year: Option<i32>,

    /// Search page size
    #[arg(long, default_value_t = 25, value_parser = clap::value_parser!(u64).range(1..=200))]
    pub page_size: u64,

    /// Sort expression override (e.g. -coverDate, -citedby-count)
    #[arg(long)]
    pub sort: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}
