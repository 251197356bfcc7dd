//! Filename derivation and collision-avoiding path allocation.
//!
//! Output filenames are derived from paper titles or DOIs, sanitized for
//! filesystem safety, and suffixed numerically when a file already exists.
//! A file on disk is never overwritten.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Maximum length of a derived filename base, in characters.
const MAX_FILENAME_LEN: usize = 120;

/// Highest numeric suffix tried before giving up on a unique path.
const MAX_SUFFIX: usize = 9999;

/// Errors produced by path allocation.
#[derive(Debug, Error)]
pub enum NamingError {
    /// Every candidate suffix up to the bound was already taken.
    #[error("could not allocate unique path for {path}")]
    Exhausted {
        /// The base path for which allocation failed.
        path: PathBuf,
    },
}

/// Sanitizes `value` into a filesystem-safe filename base.
///
/// Runs of characters outside `[A-Za-z0-9._-]` collapse to a single `_`,
/// leading/trailing `.`/`_` are trimmed, and the result is truncated to
/// 120 characters. Falls back to `default` when the input is empty or
/// sanitizes away entirely.
#[must_use]
pub fn safe_filename(value: &str, default: &str) -> String {
    let text = value.trim();
    let text = if text.is_empty() { default } else { text };

    let mut out = String::new();
    let mut prev_sep = false;
    for ch in text.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            out.push(ch);
            prev_sep = false;
        } else if !prev_sep {
            out.push('_');
            prev_sep = true;
        }
    }

    let trimmed = out.trim_matches(['.', '_']).to_string();
    let base = if trimmed.is_empty() {
        default.to_string()
    } else {
        trimmed
    };
    base.chars().take(MAX_FILENAME_LEN).collect()
}

/// Resolves a path that does not exist at call time.
///
/// Returns `path` itself when free; otherwise tries `stem_2`, `stem_3`, ...
/// up to a bounded suffix space. Exhausting the space is an allocation
/// failure, never a silent overwrite.
///
/// # Errors
///
/// Returns [`NamingError::Exhausted`] when every suffixed candidate exists.
pub fn unique_path(path: &Path) -> Result<PathBuf, NamingError> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }

    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "paper".to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let parent = path.parent().unwrap_or_else(|| Path::new("."));

    for idx in 2..=MAX_SUFFIX {
        let candidate = parent.join(format!("{stem}_{idx}{ext}"));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(NamingError::Exhausted {
        path: path.to_path_buf(),
    })
}
