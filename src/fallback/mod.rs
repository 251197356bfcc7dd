//! External retrieval tool fallback (scihub-cli).
//!
//! When the open-access path fails, the engine can escalate to an external
//! retrieval tool run as a subprocess. The tool reads one DOI per line from an
//! input file and writes PDFs somewhere under an output directory; this module
//! resolves the command to invoke, runs it inside an isolated temporary
//! working area, and harvests the largest valid PDF it produced.
//!
//! # Module structure note
//!
//! Single-file module (`mod.rs`-only): the feature scope is small enough to
//! not warrant sub-files.

use std::env;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::naming::{NamingError, unique_path};

/// Invocation used when the tool is not preinstalled but `uvx` is available.
pub const UVX_FALLBACK_CMD: [&str; 4] = [
    "uvx",
    "--from",
    "git+https://github.com/Oxidane-bot/scihub-cli.git",
    "scihub-cli",
];

/// Nonempty log lines kept when compacting tool output into an error.
const LOG_TAIL_LINES: usize = 6;

#[allow(clippy::expect_used)]
static DOWNLOAD_URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Download URL:\s*(\S+)").expect("download URL regex is valid") // Static pattern, safe to panic
});

/// When the fallback path runs relative to the primary open-access path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackMode {
    /// Open-access path only.
    Off,
    /// Run the fallback when the open-access path fails.
    Auto,
    /// Skip the open-access path and use the external tool only.
    Force,
}

impl std::fmt::Display for FallbackMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Off => write!(f, "off"),
            Self::Auto => write!(f, "auto"),
            Self::Force => write!(f, "force"),
        }
    }
}

/// Immutable per-run fallback configuration, shared across all resolutions.
#[derive(Debug, Clone)]
pub struct FallbackConfig {
    /// Escalation mode.
    pub mode: FallbackMode,
    /// Resolved command argv, or `None` with `setup_error` explaining why.
    pub command: Option<Vec<String>>,
    /// Email forwarded to the tool's internal open-access source.
    pub email: Option<String>,
    /// Configured per-DOI fallback timeout in seconds (floors applied at run time).
    pub timeout_secs: u64,
    /// Human-readable reason the command could not be resolved.
    pub setup_error: Option<String>,
}

impl FallbackConfig {
    /// Resolves the external command (unless mode is `off`) and freezes the
    /// per-run configuration.
    #[must_use]
    pub fn resolve(
        mode: FallbackMode,
        command_override: Option<&str>,
        email: Option<String>,
        timeout_secs: u64,
    ) -> Self {
        let (command, setup_error) = if mode == FallbackMode::Off {
            (None, None)
        } else {
            resolve_fallback_command(command_override)
        };
        if let Some(ref reason) = setup_error {
            warn!(reason = %reason, "Fallback tool not available");
        }
        Self {
            mode,
            command,
            email,
            timeout_secs,
            setup_error,
        }
    }
}

/// Errors terminal for a single fallback attempt.
///
/// The `Display` forms are the stable error codes recorded in resolution
/// outcomes.
#[derive(Debug, Error)]
pub enum FallbackError {
    /// No command was resolved at startup.
    #[error("{reason}")]
    NotAvailable {
        /// The recorded setup error, or a generic marker.
        reason: String,
    },

    /// Preparing the temporary working area failed.
    #[error("scihub_cli_workdir_error: {source}")]
    Workdir {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The subprocess could not be spawned or awaited.
    #[error("scihub_cli_exec_error: {source}")]
    Exec {
        /// The underlying spawn/wait error.
        #[source]
        source: std::io::Error,
    },

    /// The subprocess exceeded the overall wall-clock timeout.
    #[error("scihub_cli_timeout_after_{secs}s")]
    Timeout {
        /// The enforced timeout in seconds.
        secs: u64,
    },

    /// The tool exited nonzero without producing a PDF.
    #[error("scihub_cli_no_pdf_exit_{code}: {detail}")]
    NoPdfExit {
        /// The tool's exit code.
        code: i32,
        /// Compacted tail of the tool's output.
        detail: String,
    },

    /// The tool exited cleanly but produced no PDF.
    #[error("scihub_cli_no_pdf: {detail}")]
    NoPdf {
        /// Compacted tail of the tool's output.
        detail: String,
    },

    /// The selected output file does not start with the PDF magic header.
    #[error("scihub_cli_invalid_pdf_header")]
    InvalidPdfHeader,

    /// Copying the PDF into the real output directory failed.
    #[error("scihub_cli_copy_error: {source}")]
    Copy {
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// No free filename could be allocated in the output directory.
    #[error(transparent)]
    Naming(#[from] NamingError),
}

/// A successful fallback attempt.
#[derive(Debug)]
pub struct FallbackSuccess {
    /// Where the validated PDF was copied.
    pub path: PathBuf,
    /// Source URL scraped from the tool's output, when present.
    pub resolved_url: Option<String>,
}

/// Resolves the external tool invocation.
///
/// Resolution order: explicit override (path must exist / bare program must be
/// on `PATH`), preinstalled `scihub-cli`, `uvx` package-runner invocation,
/// else none with a descriptive setup error.
#[must_use]
pub fn resolve_fallback_command(
    command_override: Option<&str>,
) -> (Option<Vec<String>>, Option<String>) {
    if let Some(override_str) = command_override {
        let cmd: Vec<String> = override_str
            .split_whitespace()
            .map(str::to_string)
            .collect();
        let Some(first) = cmd.first() else {
            return (None, Some("empty_scihub_cmd".to_string()));
        };
        if first.contains(std::path::MAIN_SEPARATOR) {
            if Path::new(first).exists() {
                return (Some(cmd), None);
            }
            return (None, Some(format!("scihub_cmd_not_found: {first}")));
        }
        if find_on_path(first) {
            return (Some(cmd), None);
        }
        return (None, Some(format!("scihub_cmd_not_found: {first}")));
    }

    if find_on_path("scihub-cli") {
        return (Some(vec!["scihub-cli".to_string()]), None);
    }

    if find_on_path("uvx") {
        return (
            Some(UVX_FALLBACK_CMD.iter().map(|s| (*s).to_string()).collect()),
            None,
        );
    }

    (
        None,
        Some(
            "scihub_cli_not_found (install with: uv tool install \
             git+https://github.com/Oxidane-bot/scihub-cli.git)"
                .to_string(),
        ),
    )
}

/// Runs the external tool for one DOI and harvests its best PDF.
///
/// The tool runs inside a fresh temporary directory holding the input file
/// and an isolated output directory. After it returns (or times out), the
/// output tree is scanned for the largest `*.pdf` file; only a file with a
/// valid `%PDF` header is copied into `outdir` under a collision-avoided
/// name. The temporary area is discarded on every exit path.
///
/// # Errors
///
/// Returns a [`FallbackError`] describing which stage failed; see the variant
/// docs for the recorded error codes.
pub async fn attempt_fallback(
    doi: &str,
    outdir: &Path,
    filename_base: &str,
    config: &FallbackConfig,
) -> Result<FallbackSuccess, FallbackError> {
    let Some(command) = config.command.as_deref() else {
        return Err(FallbackError::NotAvailable {
            reason: config
                .setup_error
                .clone()
                .unwrap_or_else(|| "scihub_fallback_not_available".to_string()),
        });
    };

    let workdir = tempfile::Builder::new()
        .prefix("scihub_fallback_")
        .tempdir()
        .map_err(|source| FallbackError::Workdir { source })?;

    let input_file = workdir.path().join("input.txt");
    tokio::fs::write(&input_file, format!("{doi}\n"))
        .await
        .map_err(|source| FallbackError::Workdir { source })?;

    let tmp_out = workdir.path().join("out");
    tokio::fs::create_dir_all(&tmp_out)
        .await
        .map_err(|source| FallbackError::Workdir { source })?;

    // Per-attempt timeout floors at 15s; the overall wall clock at 60s.
    let per_attempt_secs = std::cmp::max(15, config.timeout_secs / 3);
    let overall_secs = std::cmp::max(60, config.timeout_secs);

    let (program, args) = command
        .split_first()
        .ok_or_else(|| FallbackError::NotAvailable {
            reason: "empty_scihub_cmd".to_string(),
        })?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .arg(&input_file)
        .arg("-o")
        .arg(&tmp_out)
        .arg("-t")
        .arg(per_attempt_secs.to_string())
        .args(["-r", "2", "-p", "1"]);
    if let Some(email) = &config.email {
        cmd.args(["--email", email]);
    }
    cmd.stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true);

    debug!(program = %program, doi = %doi, timeout_secs = overall_secs, "Invoking fallback tool");

    let child = cmd
        .spawn()
        .map_err(|source| FallbackError::Exec { source })?;

    let output = match tokio::time::timeout(
        Duration::from_secs(overall_secs),
        child.wait_with_output(),
    )
    .await
    {
        // Dropping the timed-out future kills the child (kill_on_drop).
        Err(_) => return Err(FallbackError::Timeout { secs: overall_secs }),
        Ok(Err(source)) => return Err(FallbackError::Exec { source }),
        Ok(Ok(output)) => output,
    };

    let logs = format!(
        "{}\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );

    let Some(best_pdf) = find_best_pdf(&tmp_out) else {
        let detail = non_empty_tail(&logs);
        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            return Err(FallbackError::NoPdfExit { code, detail });
        }
        return Err(FallbackError::NoPdf { detail });
    };

    if !is_valid_pdf_file(&best_pdf) {
        return Err(FallbackError::InvalidPdfHeader);
    }

    let target = unique_path(&outdir.join(format!("{filename_base}.pdf")))?;
    tokio::fs::copy(&best_pdf, &target)
        .await
        .map_err(|source| FallbackError::Copy { source })?;

    let resolved_url = DOWNLOAD_URL_PATTERN
        .captures(&logs)
        .map(|caps| caps[1].to_string());

    debug!(path = %target.display(), "Fallback PDF harvested");
    Ok(FallbackSuccess {
        path: target,
        resolved_url,
    })
}

fn find_on_path(program: &str) -> bool {
    let Some(paths) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&paths).any(|dir| dir.join(program).is_file())
}

/// Recursively finds the largest `*.pdf` file under `root`.
///
/// Larger files are more likely complete rather than error stubs.
fn find_best_pdf(root: &Path) -> Option<PathBuf> {
    let mut best: Option<(u64, PathBuf)> = None;
    collect_pdfs(root, &mut best);
    best.map(|(_, path)| path)
}

fn collect_pdfs(dir: &Path, best: &mut Option<(u64, PathBuf)>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_pdfs(&path, best);
            continue;
        }
        let is_pdf_name = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if !is_pdf_name {
            continue;
        }
        let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
        if best.as_ref().is_none_or(|(best_size, _)| size > *best_size) {
            *best = Some((size, path));
        }
    }
}

fn is_valid_pdf_file(path: &Path) -> bool {
    std::fs::read(path)
        .map(|data| data.starts_with(crate::acquire::PDF_MAGIC))
        .unwrap_or(false)
}

/// Joins the last few nonempty log lines for compact error detail.
fn non_empty_tail(text: &str) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return "no_detail".to_string();
    }
    let start = lines.len().saturating_sub(LOG_TAIL_LINES);
    lines[start..].join(" | ")
}
