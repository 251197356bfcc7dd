//! Integration tests for the external fallback tool adapter.
//!
//! A shell script stands in for the real retrieval tool; the adapter only
//! cares about the argv contract, the output directory, and the logs.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use paperfetch::fallback::{FallbackConfig, FallbackError, FallbackMode, attempt_fallback};
use tempfile::TempDir;

fn write_tool(dir: &Path, body: &str) -> PathBuf {
    let path = dir.join("fake-scihub.sh");
    std::fs::write(&path, body).unwrap();
    let mut perms = std::fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).unwrap();
    path
}

fn config_for(tool: &Path) -> FallbackConfig {
    let config = FallbackConfig::resolve(
        FallbackMode::Force,
        Some(&tool.to_string_lossy()),
        Some("test@example.org".to_string()),
        90,
    );
    assert!(config.setup_error.is_none());
    config
}

/// Writes a small and a large PDF into the tool's output directory and
/// announces a source URL on stdout.
const SUCCESS_TOOL: &str = r#"#!/bin/sh
outdir=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then outdir="$arg"; fi
  prev="$arg"
done
printf '%%PDF-1.4 small' > "$outdir/small.pdf"
{ printf '%%PDF-1.4 '; head -c 4096 /dev/zero | tr '\0' 'x'; } > "$outdir/big.pdf"
echo "Download URL: https://mirror.example/harvest.pdf"
"#;

#[tokio::test]
async fn test_fallback_harvests_largest_pdf_and_scrapes_url() {
    let tools = TempDir::new().unwrap();
    let outdir = TempDir::new().unwrap();
    let tool = write_tool(tools.path(), SUCCESS_TOOL);

    let success = attempt_fallback("10.1/x", outdir.path(), "base", &config_for(&tool))
        .await
        .unwrap();

    assert_eq!(success.path, outdir.path().join("base.pdf"));
    assert_eq!(
        success.resolved_url.as_deref(),
        Some("https://mirror.example/harvest.pdf")
    );
    let data = std::fs::read(&success.path).unwrap();
    assert!(data.starts_with(b"%PDF-1.4"));
    // The larger of the two PDFs was selected.
    assert!(data.len() > 4000);
}

#[tokio::test]
async fn test_fallback_avoids_existing_filename() {
    let tools = TempDir::new().unwrap();
    let outdir = TempDir::new().unwrap();
    std::fs::write(outdir.path().join("base.pdf"), b"%PDF existing").unwrap();
    let tool = write_tool(tools.path(), SUCCESS_TOOL);

    let success = attempt_fallback("10.1/x", outdir.path(), "base", &config_for(&tool))
        .await
        .unwrap();

    assert_eq!(success.path, outdir.path().join("base_2.pdf"));
    assert_eq!(
        std::fs::read(outdir.path().join("base.pdf")).unwrap(),
        b"%PDF existing"
    );
}

#[tokio::test]
async fn test_fallback_nonzero_exit_without_pdf() {
    let tools = TempDir::new().unwrap();
    let outdir = TempDir::new().unwrap();
    let tool = write_tool(
        tools.path(),
        "#!/bin/sh\necho 'no mirrors reachable' >&2\nexit 3\n",
    );

    let err = attempt_fallback("10.1/x", outdir.path(), "base", &config_for(&tool))
        .await
        .unwrap_err();

    match err {
        FallbackError::NoPdfExit { code, detail } => {
            assert_eq!(code, 3);
            assert!(detail.contains("no mirrors reachable"));
        }
        other => panic!("expected NoPdfExit, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fallback_clean_exit_without_pdf() {
    let tools = TempDir::new().unwrap();
    let outdir = TempDir::new().unwrap();
    let tool = write_tool(tools.path(), "#!/bin/sh\necho 'nothing found'\nexit 0\n");

    let err = attempt_fallback("10.1/x", outdir.path(), "base", &config_for(&tool))
        .await
        .unwrap_err();

    match err {
        FallbackError::NoPdf { detail } => assert!(detail.contains("nothing found")),
        other => panic!("expected NoPdf, got {other:?}"),
    }
}

#[tokio::test]
async fn test_fallback_rejects_file_without_pdf_magic() {
    let tools = TempDir::new().unwrap();
    let outdir = TempDir::new().unwrap();
    let tool = write_tool(
        tools.path(),
        r#"#!/bin/sh
outdir=""
prev=""
for arg in "$@"; do
  if [ "$prev" = "-o" ]; then outdir="$arg"; fi
  prev="$arg"
done
echo '<html>captcha page</html>' > "$outdir/fake.pdf"
"#,
    );

    let err = attempt_fallback("10.1/x", outdir.path(), "base", &config_for(&tool))
        .await
        .unwrap_err();

    assert!(matches!(err, FallbackError::InvalidPdfHeader));
    assert!(!outdir.path().join("base.pdf").exists());
}

#[tokio::test]
async fn test_fallback_passes_doi_and_email_through_argv() {
    // The tool echoes its input file and argv so the contract is observable.
    let tools = TempDir::new().unwrap();
    let outdir = TempDir::new().unwrap();
    let tool = write_tool(
        tools.path(),
        r#"#!/bin/sh
cat "$1"
echo "argv: $@"
exit 1
"#,
    );

    let err = attempt_fallback("10.9999/doi-under-test", outdir.path(), "base", &config_for(&tool))
        .await
        .unwrap_err();

    let detail = err.to_string();
    assert!(detail.contains("10.9999/doi-under-test"), "got: {detail}");
    assert!(detail.contains("--email test@example.org"), "got: {detail}");
    assert!(detail.contains("-r 2 -p 1"), "got: {detail}");
}
