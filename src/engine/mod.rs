//! Per-DOI resolution engine.
//!
//! Orchestrates the open-access resolver, the PDF acquirer, and the external
//! fallback adapter into a single [`ResolutionOutcome`] per DOI. The
//! escalation policy:
//!
//! - fallback mode `force`: skip the primary path entirely;
//! - otherwise run the primary (Unpaywall) path, which requires a contact
//!   email;
//! - fallback mode `auto`: escalate to the external tool when the primary
//!   path did not produce a file.
//!
//! At most one file is written per `downloaded` outcome; all network calls
//! are idempotent GETs.

mod outcome;

pub use outcome::{DownloadMethod, OutcomeStatus, ResolutionOutcome};

use std::path::PathBuf;

use tracing::{debug, info, instrument};

use crate::acquire::PdfAcquirer;
use crate::fallback::{FallbackConfig, FallbackMode, attempt_fallback};
use crate::naming::{safe_filename, unique_path};
use crate::unpaywall::{UnpaywallClient, build_candidate_urls};

/// Recorded when the primary path cannot run for lack of a contact email.
const MISSING_EMAIL_ERROR: &str = "missing_unpaywall_email";

/// Drives one DOI through the primary and fallback acquisition paths.
///
/// Holds the per-run collaborators; resolutions are strictly sequential, one
/// DOI in flight at a time.
#[derive(Debug)]
pub struct ResolutionEngine {
    /// Open-access resolver; `None` when no contact email was supplied.
    unpaywall: Option<UnpaywallClient>,
    acquirer: PdfAcquirer,
    fallback: FallbackConfig,
    outdir: PathBuf,
}

impl ResolutionEngine {
    /// Assembles an engine from pre-built collaborators.
    #[must_use]
    pub fn new(
        unpaywall: Option<UnpaywallClient>,
        acquirer: PdfAcquirer,
        fallback: FallbackConfig,
        outdir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            unpaywall,
            acquirer,
            fallback,
            outdir: outdir.into(),
        }
    }

    /// The frozen fallback configuration this engine runs with.
    #[must_use]
    pub fn fallback_config(&self) -> &FallbackConfig {
        &self.fallback
    }

    /// Resolves one DOI to a downloadable PDF, escalating per the fallback
    /// mode, and returns the complete outcome record.
    #[instrument(skip(self), fields(doi = %doi))]
    pub async fn resolve(&self, doi: &str) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::new(doi);
        let doi_base = safe_filename(&doi.replace('/', "_"), "paper");

        if self.fallback.mode == FallbackMode::Force {
            return self.resolve_forced(outcome, &doi_base).await;
        }

        let Some(unpaywall) = &self.unpaywall else {
            outcome.status = OutcomeStatus::Failed;
            outcome.error = Some(MISSING_EMAIL_ERROR.to_string());
            outcome.primary_status = Some(OutcomeStatus::Failed);
            outcome.primary_error = Some(MISSING_EMAIL_ERROR.to_string());
            return outcome;
        };

        let mut primary_status = OutcomeStatus::Failed;
        let mut primary_error: Option<String> = None;
        let mut filename_base = doi_base;

        match unpaywall.lookup(doi).await {
            Err(err) => {
                debug!(error = %err, "Unpaywall lookup failed");
                primary_error = Some(err.to_string());
            }
            Ok(record) => {
                let title = record.title.clone().unwrap_or_default();
                outcome.title = Some(title.clone());
                outcome.is_oa = Some(record.is_oa);
                filename_base = safe_filename(&title, &filename_base);

                if record.is_oa {
                    let candidates = build_candidate_urls(&record);
                    if candidates.is_empty() {
                        primary_status = OutcomeStatus::NoDownloadUrl;
                    } else {
                        match unique_path(&self.outdir.join(format!("{filename_base}.pdf"))) {
                            Err(err) => primary_error = Some(err.to_string()),
                            Ok(out_path) => {
                                for candidate in &candidates {
                                    let attempt =
                                        self.acquirer.attempt_download(candidate, &out_path).await;
                                    if attempt.succeeded() {
                                        info!(
                                            url = %attempt.resolved_url,
                                            path = %out_path.display(),
                                            "Downloaded via open-access path"
                                        );
                                        outcome.status = OutcomeStatus::Downloaded;
                                        outcome.resolved_url = Some(attempt.resolved_url);
                                        outcome.path = Some(out_path);
                                        outcome.download_method = Some(DownloadMethod::Unpaywall);
                                        outcome.primary_status = Some(OutcomeStatus::Downloaded);
                                        return outcome;
                                    }
                                    // The last candidate's error is the representative one.
                                    primary_error = attempt.error.map(|e| e.to_string());
                                    outcome.resolved_url = Some(attempt.resolved_url);
                                }
                            }
                        }
                    }
                } else {
                    primary_status = OutcomeStatus::NoOa;
                }
            }
        }

        outcome.primary_status = Some(primary_status);
        outcome.primary_error = primary_error.clone();

        if self.fallback.mode != FallbackMode::Auto {
            outcome.status = primary_status;
            outcome.error = primary_error;
            return outcome;
        }

        if self.fallback.command.is_none() {
            // A missing tool is a setup condition, not a new primary failure.
            outcome.status = primary_status;
            outcome.error = primary_error;
            outcome.fallback_error = self.fallback.setup_error.clone();
            return outcome;
        }

        outcome.fallback_attempted = true;
        match attempt_fallback(doi, &self.outdir, &filename_base, &self.fallback).await {
            Ok(success) => {
                info!(path = %success.path.display(), "Downloaded via fallback tool");
                outcome.status = OutcomeStatus::Downloaded;
                outcome.path = Some(success.path);
                if success.resolved_url.is_some() {
                    outcome.resolved_url = success.resolved_url;
                }
                outcome.error = None;
                outcome.download_method = Some(DownloadMethod::ScihubFallback);
                outcome.fallback_error = None;
            }
            Err(err) => {
                let message = err.to_string();
                debug!(error = %message, "Fallback attempt failed");
                outcome.status = OutcomeStatus::Failed;
                // Prefer the more specific primary error at the top level.
                outcome.error = primary_error.or_else(|| Some(message.clone()));
                outcome.fallback_error = Some(message);
            }
        }
        outcome
    }

    /// Forced-fallback resolution: the primary path is never consulted and
    /// the DOI-derived name is the filename base.
    async fn resolve_forced(
        &self,
        mut outcome: ResolutionOutcome,
        filename_base: &str,
    ) -> ResolutionOutcome {
        outcome.fallback_attempted = true;
        match attempt_fallback(&outcome.doi, &self.outdir, filename_base, &self.fallback).await {
            Ok(success) => {
                info!(path = %success.path.display(), "Downloaded via forced fallback");
                outcome.status = OutcomeStatus::Downloaded;
                outcome.path = Some(success.path);
                outcome.resolved_url = success.resolved_url;
                outcome.download_method = Some(DownloadMethod::ScihubFallback);
            }
            Err(err) => {
                let message = err.to_string();
                outcome.status = OutcomeStatus::Failed;
                outcome.error = Some(message.clone());
                outcome.fallback_error = Some(message);
            }
        }
        outcome
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn engine(fallback: FallbackConfig, outdir: &std::path::Path) -> ResolutionEngine {
        ResolutionEngine::new(
            None,
            PdfAcquirer::new(Duration::from_secs(5)).unwrap(),
            fallback,
            outdir,
        )
    }

    fn unavailable_fallback(mode: FallbackMode) -> FallbackConfig {
        FallbackConfig {
            mode,
            command: None,
            email: None,
            timeout_secs: 180,
            setup_error: Some("scihub_cli_not_found".to_string()),
        }
    }

    #[tokio::test]
    async fn test_missing_email_is_terminal_without_network() {
        let dir = TempDir::new().unwrap();
        let engine = engine(unavailable_fallback(FallbackMode::Off), dir.path());

        let outcome = engine.resolve("10.1000/xyz").await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.error.as_deref(), Some("missing_unpaywall_email"));
        assert_eq!(outcome.primary_error.as_deref(), Some("missing_unpaywall_email"));
        assert!(!outcome.fallback_attempted);
        assert!(outcome.is_oa.is_none());
    }

    #[tokio::test]
    async fn test_forced_mode_with_unresolved_command_fails_both_errors() {
        let dir = TempDir::new().unwrap();
        let engine = engine(unavailable_fallback(FallbackMode::Force), dir.path());

        let outcome = engine.resolve("10.1000/xyz").await;

        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.fallback_attempted);
        assert_eq!(outcome.error.as_deref(), Some("scihub_cli_not_found"));
        assert_eq!(outcome.fallback_error.as_deref(), Some("scihub_cli_not_found"));
        // Forced mode never touches the primary path.
        assert!(outcome.primary_status.is_none());
        assert!(outcome.title.is_none());
    }

    #[tokio::test]
    async fn test_forced_mode_skips_missing_email_check() {
        // Force mode must not require an email: the primary path never runs.
        let dir = TempDir::new().unwrap();
        let engine = engine(unavailable_fallback(FallbackMode::Force), dir.path());

        let outcome = engine.resolve("10.1000/xyz").await;
        assert_ne!(outcome.error.as_deref(), Some("missing_unpaywall_email"));
    }
}
